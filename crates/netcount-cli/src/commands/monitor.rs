use std::path::Path;

pub fn run(from: Option<&Path>, refresh: f64, stale_after: f64) {
    let refresh = super::seconds("refresh", refresh);
    let config = super::sampler_config(super::seconds("stale-after", stale_after));
    let table = super::open_table(from);

    let mut app = crate::tui::app::App::new(table, config, refresh);
    if let Err(e) = app.run() {
        eprintln!("TUI error: {e}");
        std::process::exit(1);
    }
}
