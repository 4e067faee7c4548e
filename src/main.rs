fn main() {
    if let Err(err) = vitals_capture_lib::run() {
        log::error!("{err:#}");
        eprintln!("vitals-capture: {err:#}");
        std::process::exit(1);
    }
}
