/// Normalize a plate number for storage and lookup: whitespace and dashes
/// removed, upper-cased.
pub fn normalize_plate(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_uppercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plate() {
        assert_eq!(normalize_plate(" kaa 123b "), "KAA123B");
        assert_eq!(normalize_plate("B-1234\tXYZ"), "B1234XYZ");
        assert_eq!(normalize_plate("   "), "");
    }
}
