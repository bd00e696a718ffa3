use std::path::Path;

use netcount_core::{ParseError, RawObservation, RecordLayout, parse};

pub fn run(from: Option<&Path>, format: &str) {
    let mut table = super::open_table(from);
    let capture = match table.capture() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let (observations, skipped) = match decode_all(capture.buffer) {
        Ok(decoded) => decoded,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if format == "json" {
        for o in &observations {
            match serde_json::to_string(o) {
                Ok(line) => println!("{line}"),
                Err(e) => eprintln!("Error encoding {}: {e}", o.name),
            }
        }
    } else {
        print!("{}", render(&observations, capture.buffer.len(), skipped));
    }
}

/// Decode every qualifying record, or nothing if any record is malformed.
fn decode_all(buffer: &[u8]) -> Result<(Vec<RawObservation>, usize), ParseError> {
    let mut records = parse(buffer, RecordLayout::DARWIN);
    let observations = records.by_ref().collect::<Result<Vec<_>, _>>()?;
    Ok((observations, records.skipped()))
}

fn render(observations: &[RawObservation], buffer_len: usize, skipped: usize) -> String {
    let mut out = format!(
        "{} interface(s) in {buffer_len} bytes ({skipped} record(s) skipped)\n\n",
        observations.len()
    );
    out.push_str(&format!(
        "  {:<16} {:<5} {:>12} {:>12}\n",
        "Interface", "State", "Raw in", "Raw out"
    ));
    for o in observations {
        let state = if o.up { "up" } else { "down" };
        out.push_str(&format!(
            "  {:<16} {:<5} {:>12} {:>12}\n",
            o.name, state, o.raw_in, o.raw_out
        ));
    }
    out
}
