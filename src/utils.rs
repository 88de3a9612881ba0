use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

/// Generate a random candidate code from `[A-Za-z0-9]`.
///
/// `thread_rng` is a CSPRNG, so codes are not guessable from earlier ones.
pub fn generate_code(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Normalize arbitrary text into a lowercase, hyphenated, URL-safe token.
///
/// Keeps ASCII alphanumerics, underscores and hyphens; common accented
/// Latin letters fold to their ASCII equivalents; runs of whitespace and
/// hyphens collapse into a single hyphen; everything else is dropped.
/// Leading and trailing hyphens/underscores are trimmed.
pub fn slugify(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut pending_hyphen = false;

    for ch in raw.trim().to_lowercase().chars() {
        let part: Option<&str> = if ch.is_ascii_alphanumeric() || ch == '_' {
            None
        } else if let Some(folded) = fold_ascii(ch) {
            Some(folded)
        } else if ch.is_whitespace() || ch == '-' {
            pending_hyphen = true;
            continue;
        } else {
            // everything else is dropped without acting as a separator
            continue;
        };

        if pending_hyphen && !slug.is_empty() {
            slug.push('-');
        }
        pending_hyphen = false;
        match part {
            Some(folded) => slug.push_str(folded),
            None => slug.push(ch),
        }
    }

    slug.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// ASCII fold for the accented Latin letters that actually show up in
/// aliases. Input is already lowercased.
fn fold_ascii(ch: char) -> Option<&'static str> {
    let folded = match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'æ' => "ae",
        'ç' => "c",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ñ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => "o",
        'œ' => "oe",
        'ß' => "ss",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'ý' | 'ÿ' => "y",
        _ => return None,
    };
    Some(folded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_has_requested_length_and_charset() {
        let code = generate_code(6);
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("Promo Akhir Tahun!"), "promo-akhir-tahun");
        assert_eq!(slugify("  hello   world  "), "hello-world");
        assert_eq!(slugify("Already-Slugged"), "already-slugged");
    }

    #[test]
    fn slugify_is_idempotent() {
        for raw in ["Promo Akhir Tahun!", "Déjà vu", "a_b-c d", "--x--", "cœur"] {
            let once = slugify(raw);
            assert_eq!(slugify(&once), once);
        }
    }

    #[test]
    fn slugify_folds_accented_letters_to_ascii() {
        assert_eq!(slugify("Déjà vu"), "deja-vu");
        assert_eq!(slugify("François"), "francois");
        assert_eq!(slugify("cœur brisé"), "coeur-brise");
        assert_eq!(slugify("Straße"), "strasse");
    }

    #[test]
    fn slugify_drops_punctuation_and_trims_edges() {
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify("-sale-"), "sale");
        assert_eq!(slugify("_sale_"), "sale");
        assert_eq!(slugify("c'est ça"), "cest-ca");
    }
}
