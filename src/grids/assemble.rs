use std::collections::BTreeSet;

/// Splits a whitespace-separated list of grid names. Runs of whitespace never
/// produce empty entries.
pub fn split_grid_names(raw: &str) -> impl Iterator<Item = &str> {
    raw.split_whitespace()
}

/// Unions the discovered grids with the user's extra names and returns them sorted.
pub fn build_grid_array(discovered: &BTreeSet<String>, additional_raw: &str) -> Vec<String> {
    let mut all: BTreeSet<&str> = discovered.iter().map(String::as_str).collect();
    all.extend(split_grid_names(additional_raw));
    all.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn additional_names_are_merged_sorted() {
        assert_eq!(
            build_grid_array(&set(&["density"]), "velocity   heat"),
            ["density", "heat", "velocity"]
        );
    }

    #[test]
    fn duplicates_collapse() {
        assert_eq!(build_grid_array(&set(&["density"]), "density"), ["density"]);
    }

    #[test]
    fn blank_input_adds_nothing() {
        assert!(build_grid_array(&BTreeSet::new(), "  \t \n").is_empty());
        assert_eq!(
            build_grid_array(&set(&["temperature", "density"]), ""),
            ["density", "temperature"]
        );
    }

    #[test]
    fn split_ignores_leading_and_trailing_whitespace() {
        let names: Vec<&str> = split_grid_names("  vel.x\tvel.y  ").collect();
        assert_eq!(names, ["vel.x", "vel.y"]);
    }
}
