//! URL-safe slug derivation shared by categories, products, and brands.
//!
//! Feed data arrives in Spanish, so the mapping folds common Latin
//! diacritics to ASCII instead of stripping them: `"Baños"` must become
//! `"banos"`, not `"baos"`.

/// Lowercases the input, folds Latin diacritics to ASCII, and collapses
/// every other character into single hyphens.
///
/// `"Grifería Monomando / Baño"` becomes `"griferia-monomando-bano"`.
/// Input with no usable characters produces an empty string; callers that
/// require a non-empty slug must validate the source name first.
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut mapped = String::with_capacity(input.len());
    for c in input.chars().flat_map(char::to_lowercase) {
        if let Some(folded) = fold_diacritic(c) {
            mapped.push_str(folded);
        } else if c.is_ascii_alphanumeric() {
            mapped.push(c);
        } else {
            mapped.push('-');
        }
    }

    mapped
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Returns `base` unchanged when it is free, otherwise probes `base-1`,
/// `base-2`, … until a free candidate is found.
///
/// The closure form keeps this usable against both an in-memory set and a
/// persisted slug namespace.
pub fn uniquify<F>(base: &str, mut is_taken: F) -> String
where
    F: FnMut(&str) -> bool,
{
    if !is_taken(base) {
        return base.to_string();
    }

    let mut suffix = 1u32;
    loop {
        let candidate = format!("{base}-{suffix}");
        if !is_taken(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

fn fold_diacritic(c: char) -> Option<&'static str> {
    let folded = match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => "a",
        'é' | 'è' | 'ê' | 'ë' => "e",
        'í' | 'ì' | 'î' | 'ï' => "i",
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => "o",
        'ú' | 'ù' | 'û' | 'ü' => "u",
        'ñ' => "n",
        'ç' => "c",
        'ý' | 'ÿ' => "y",
        'æ' => "ae",
        'œ' => "oe",
        'ß' => "ss",
        _ => return None,
    };
    Some(folded)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn slugify_simple_name() {
        assert_eq!(slugify("Tubos y Conexiones"), "tubos-y-conexiones");
    }

    #[test]
    fn slugify_folds_spanish_diacritics() {
        assert_eq!(slugify("Baños"), "banos");
        assert_eq!(slugify("Grifería FV"), "griferia-fv");
        assert_eq!(slugify("Calefacción"), "calefaccion");
    }

    #[test]
    fn slugify_collapses_punctuation_runs() {
        assert_eq!(slugify("PVC  -  110mm (reforzado)"), "pvc-110mm-reforzado");
    }

    #[test]
    fn slugify_trims_leading_and_trailing_separators() {
        assert_eq!(slugify("  ¡Ofertas!  "), "ofertas");
    }

    #[test]
    fn slugify_keeps_digits() {
        assert_eq!(slugify("Codo 90° x 110"), "codo-90-x-110");
    }

    #[test]
    fn slugify_empty_input_is_empty() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("¡¿?!"), "");
    }

    #[test]
    fn uniquify_returns_base_when_free() {
        let taken: HashSet<&str> = HashSet::new();
        assert_eq!(uniquify("banos", |s| taken.contains(s)), "banos");
    }

    #[test]
    fn uniquify_appends_first_free_suffix() {
        let taken: HashSet<&str> = ["banos", "banos-1"].into_iter().collect();
        assert_eq!(uniquify("banos", |s| taken.contains(s)), "banos-2");
    }

    #[test]
    fn uniquify_skips_holes_in_order() {
        // banos-1 free even though banos-2 is taken: first free wins.
        let taken: HashSet<&str> = ["banos", "banos-2"].into_iter().collect();
        assert_eq!(uniquify("banos", |s| taken.contains(s)), "banos-1");
    }
}
