use std::path::Path;

pub fn run(from: Option<&Path>, path: &Path) {
    let mut table = super::open_table(from);
    let source = table.describe();
    let capture = match table.capture() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = std::fs::write(path, capture.buffer) {
        eprintln!("Error writing {}: {e}", path.display());
        std::process::exit(1);
    }
    println!(
        "Wrote {} bytes from {source} to {}",
        capture.buffer.len(),
        path.display()
    );
    println!("Replay with: netcount --from {} watch", path.display());
}
