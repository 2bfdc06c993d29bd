use skycat::driver::{open_driver, CatalogHandle, FormatDriver};
use skycat::registry::{CatalogDescriptor, CatalogRegistry, Locator, StorageKind};
use std::process;
use tracing_subscriber::EnvFilter;

fn format_kind(kind: &StorageKind) -> String {
    match kind {
        StorageKind::Binary(path) => format!("binary {}", path.display()),
        StorageKind::Ascii(path) => format!("ASCII {}", path.display()),
        StorageKind::TabTable(Locator::File(path)) => format!("tab-table {}", path.display()),
        StorageKind::TabTable(Locator::Remote { url }) => format!("remote tab-table {}", url),
        StorageKind::ZoneBucketed(root) => format!("UCAC2 zones in {}", root.display()),
        StorageKind::Tycho2(root) => format!("Tycho-2 regions in {}", root.display()),
        StorageKind::Usno { root, layout } => {
            format!("USNO {:?} zones in {}", layout, root.display())
        }
    }
}

fn format_descriptor(d: &CatalogDescriptor) -> String {
    let mut out = String::new();
    out.push_str(&format!("Catalog: {} ({})\n", d.name, d.family.label()));
    out.push_str(&format!("  Storage: {}\n", format_kind(&d.kind)));
    if d.mixed_frames {
        out.push_str("  Frame: per record\n");
    } else {
        out.push_str(&format!(
            "  Frame: {} equinox {:.1} epoch {:.1}\n",
            d.frame.sys.name(),
            d.frame.equinox,
            d.frame.epoch
        ));
    }
    out.push_str(&format!("  Magnitudes: {}\n", d.nmag));
    out.push_str(&format!(
        "  Proper motion: {}\n",
        if d.proper_motion { "yes" } else { "no" }
    ));
    out.push_str(&format!(
        "  RA sorted: {}\n",
        if d.ra_sorted { "yes" } else { "no" }
    ));
    out.push_str(&format!("  Id format: {:?}\n", d.id_format));
    out
}

/// Sum record counts over every zone that exists on disk.
fn count_records(d: &CatalogDescriptor) -> Result<(u64, usize), String> {
    let driver = open_driver(d, None).map_err(|e| format!("Error opening '{}': {}", d.name, e))?;
    let mut records = 0;
    let mut zones = 0;
    for zone in driver.all_zones() {
        match driver.open_zone(zone) {
            Ok(handle) => {
                records += handle.len();
                zones += 1;
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(format!("Error reading '{}' zone {}: {}", d.name, zone, e)),
        }
    }
    Ok((records, zones))
}

fn run(args: &[String], registry: &CatalogRegistry) -> Result<String, String> {
    let mut count = false;
    let mut names = Vec::new();

    for arg in args {
        if arg == "-c" || arg == "--count" {
            count = true;
        } else if arg.starts_with('-') {
            return Err(format!("Unknown option: {}", arg));
        } else {
            names.push(arg.as_str());
        }
    }

    if names.is_empty() {
        return Err("Usage: catinfo [-c] <catalog>...\n\n\
             Print the descriptor of each named catalog; -c also counts records."
            .to_string());
    }

    let mut out = String::new();
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let d = registry
            .resolve(name)
            .map_err(|e| format!("Error resolving '{}': {}", name, e))?;
        out.push_str(&format_descriptor(&d));
        if count && !d.is_remote() {
            let (records, zones) = count_records(&d)?;
            out.push_str(&format!("  Records: {} in {} zone(s)\n", records, zones));
        }
    }
    Ok(out)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args, &CatalogRegistry::from_env()) {
        Ok(output) => print!("{}", output),
        Err(msg) => {
            eprintln!("{}", msg);
            process::exit(1);
        }
    }
}
