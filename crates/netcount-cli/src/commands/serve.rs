use std::path::Path;

use netcount_server::ServerConfig;

pub fn run(from: Option<&Path>, host: &str, port: u16, interval: f64, stale_after: f64) {
    let config = ServerConfig {
        host: host.to_string(),
        port,
        interval: super::seconds("interval", interval),
        sampler: super::sampler_config(super::seconds("stale-after", stale_after)),
    };
    let table = super::open_table(from);

    let base = format!("http://{host}:{port}");
    println!("netcount server v{}", netcount_core::VERSION);
    println!("   {base}");
    println!("   source: {}", table.describe());
    println!(
        "   sampling every {:.1}s",
        config.interval.as_secs_f64()
    );
    println!();
    println!("   Endpoints:");
    println!("     GET /                          API index (try: curl {base})");
    println!("     GET /health                    Sampler health");
    println!("     GET /api/v1/interfaces         Totals and rates for every interface");
    println!("     GET /api/v1/interfaces/<name>  Totals and rates for one interface");
    println!();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(netcount_server::run_server(table, config)) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
