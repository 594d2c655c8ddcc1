fn main() {
    if let Err(err) = rollscan_lib::run() {
        log::error!("{err:#}");
        eprintln!("rollscan: {err:#}");
        std::process::exit(1);
    }
}
