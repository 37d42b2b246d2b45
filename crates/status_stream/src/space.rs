/// Threshold scheme for rendering byte counts.
///
/// Both schemes divide by binary multiples; they differ in where the unit
/// switches. `Decimal` switches at powers of ten, which puts e.g. 9 MiB in
/// the `K` bucket; `Binary` switches at powers of two.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum SpaceUnits {
    #[default]
    Decimal,
    Binary,
}

const KIB: u64 = 1 << 10;
const MIB: u64 = 1 << 20;
const GIB: u64 = 1 << 30;
const TIB: u64 = 1 << 40;

pub fn format_space(bytes: u64, units: SpaceUnits) -> String {
    match units {
        SpaceUnits::Decimal => {
            if bytes <= 10_000 {
                format!("{bytes} Bytes")
            } else if bytes <= 10_000_000 {
                format!("{}K", bytes / KIB)
            } else if bytes <= 10_000_000_000 {
                format!("{}M", bytes / MIB)
            } else if bytes <= 10_000_000_000_000 {
                format!("{}G", bytes / GIB)
            } else {
                format!("{}T", bytes / TIB)
            }
        }
        SpaceUnits::Binary => {
            if bytes <= KIB {
                format!("{bytes}B")
            } else if bytes <= MIB {
                format!("{}K", bytes / KIB)
            } else if bytes <= GIB {
                format!("{}M", bytes / MIB)
            } else if bytes <= TIB {
                format!("{}G", bytes / GIB)
            } else {
                format!("{}T", bytes / TIB)
            }
        }
    }
}
