fn main() {
    if let Err(err) = panorama_canvas::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
