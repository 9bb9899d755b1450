use std::collections::HashSet;
use calamine::Data;

/// Makes a header unique within the sheet, suffixing repeats with `.1`, `.2`, ...
pub fn unique_column_name(raw: &str, index: usize, existing_names: &mut HashSet<String>) -> String {
    let trimmed = raw.trim();
    let base_name = if trimmed.is_empty() {
        format!("Unnamed: {}", index)
    } else {
        trimmed.to_string()
    };

    let mut cleaned = base_name.clone();
    let mut counter = 1;
    while !existing_names.insert(cleaned.clone()) {
        cleaned = format!("{}.{}", base_name, counter);
        counter += 1;
    }

    cleaned
}

/// Storage class a worksheet column resolves to once its cells are inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Integer,
    Float,
    Boolean,
    DateTime,
    Text,
    Empty,
}

pub fn is_missing(cell: &Data) -> bool {
    match cell {
        Data::Empty | Data::Error(_) => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Picks the narrowest kind that holds every non-missing cell.
pub fn detect_column_kind(values: &[Data]) -> CellKind {
    let mut kind = CellKind::Empty;

    for value in values.iter().filter(|v| !is_missing(v)) {
        let cell_kind = match value {
            Data::Int(_) => CellKind::Integer,
            Data::Float(_) => CellKind::Float,
            Data::Bool(_) => CellKind::Boolean,
            Data::DateTime(_) | Data::DateTimeIso(_) => CellKind::DateTime,
            _ => CellKind::Text,
        };

        kind = match (kind, cell_kind) {
            (CellKind::Empty, k) => k,
            (a, b) if a == b => a,
            (CellKind::Integer, CellKind::Float) | (CellKind::Float, CellKind::Integer) => {
                CellKind::Float
            }
            _ => return CellKind::Text,
        };
    }

    kind
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_headers_get_suffixes() {
        let mut seen = HashSet::new();
        assert_eq!(unique_column_name("sales", 0, &mut seen), "sales");
        assert_eq!(unique_column_name("sales", 1, &mut seen), "sales.1");
        assert_eq!(unique_column_name("sales", 2, &mut seen), "sales.2");
        assert_eq!(unique_column_name("  ", 3, &mut seen), "Unnamed: 3");
    }

    #[test]
    fn mixed_numbers_widen_to_float() {
        let values = vec![Data::Int(1), Data::Float(2.5), Data::Empty];
        assert_eq!(detect_column_kind(&values), CellKind::Float);
    }

    #[test]
    fn mixed_types_fall_back_to_text() {
        let values = vec![Data::Int(1), Data::String("x".into())];
        assert_eq!(detect_column_kind(&values), CellKind::Text);
    }

    #[test]
    fn all_missing_is_empty() {
        let values = vec![Data::Empty, Data::String(" ".into())];
        assert_eq!(detect_column_kind(&values), CellKind::Empty);
    }
}
