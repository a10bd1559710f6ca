use byteorder::{BigEndian, ByteOrder};
use sdts_reader::{FieldStructure, SdtsReader, Subfield};
use std::env;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!(
            "Usage: {} <path-to-ddf-file[.gz]> [--limit <N>] [--raw]",
            args[0]
        );
        std::process::exit(1);
    }

    let ddf_path = &args[1];
    let mut limit: Option<usize> = None;
    let mut raw = false;
    // Parse --limit / --raw arguments
    if let Some(limit_idx) = args.iter().position(|arg| arg == "--limit") {
        match args.get(limit_idx + 1).and_then(|s| s.parse().ok()) {
            Some(n) => limit = Some(n),
            None => {
                eprintln!("ERROR: --limit flag requires a numeric argument.");
                std::process::exit(1);
            }
        }
    }
    if args.iter().any(|arg| arg == "--raw") {
        raw = true;
    }

    println!("Reading SDTS file: {}", ddf_path);
    println!("{}", "=".repeat(60));

    let mut reader = match SdtsReader::open(ddf_path) {
        Ok(reader) => reader,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    println!("Title: {}", reader.file_title());
    println!("Fields declared by the descriptor record:");
    for desc in reader.descriptors() {
        let structure = match desc.structure {
            FieldStructure::Elementary => "elementary",
            FieldStructure::Vector => "vector",
            FieldStructure::Array => "array",
        };
        let labels: Vec<&str> = desc.labels.iter().map(|l| l.text.as_str()).collect();
        println!(
            "  {:<7} {:<10} {:<30} [{}]",
            desc.tag,
            structure,
            desc.name,
            labels.join("!")
        );
    }
    println!("{}", "=".repeat(60));

    let mut count = 0usize;
    loop {
        if let Some(n) = limit {
            if count >= n {
                println!("... stopped after {} subfields (--limit)", n);
                break;
            }
        }
        match reader.next_subfield() {
            Ok(Some(subfield)) => {
                println!(
                    "{:<7} {:<12} ({:>5}) {}",
                    subfield.tag(),
                    subfield.label(),
                    subfield.len(),
                    render(&subfield, raw)
                );
                count += 1;
            }
            Ok(None) => {
                println!("{}", "=".repeat(60));
                println!("Done: {} subfields.", count);
                break;
            }
            Err(e) => {
                eprintln!("ERROR after {} subfields: {}", count, e);
                std::process::exit(1);
            }
        }
    }
}

/// Render a subfield value for display.
///
/// Binary payloads are shown as big-endian integers when they are 2 or 4
/// bytes wide (the widths USGS DEM profiles use); everything else falls
/// back to hex. The decoder itself never swabs bytes.
fn render(subfield: &Subfield<'_>, raw: bool) -> String {
    if raw || (subfield.is_binary() && !matches!(subfield.len(), 2 | 4)) {
        return hex_string(subfield.data());
    }
    if subfield.is_binary() {
        let value = match subfield.len() {
            2 => BigEndian::read_i16(subfield.data()) as i64,
            _ => BigEndian::read_i32(subfield.data()) as i64,
        };
        return format!("{} (BE)", value);
    }
    match subfield.text() {
        Some(text) => text.to_string(),
        None => hex_string(subfield.data()),
    }
}

fn hex_string(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
