use once_cell::sync::Lazy;
use regex::Regex;

/// Length directive extracted from a prompt. `Default` means no directive was
/// found and output is returned as-is (whitespace-trimmed only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthRequirement {
    Default,
    Lines(usize),
    Words(usize),
}

// Line patterns are checked strictly before word patterns; the first match in
// list order wins and the scan stops there. Counts are ascii digits only: \d
// would also admit other scripts' digits, which are not directives.
static LINE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?:in |write |create |generate |make )?(?:exactly )?(?:just )?(?:only )?([0-9]+) lines?").unwrap(),
        Regex::new(r"(?:in |write |create |generate |make )?(?:exactly )?(?:just )?(?:only )?(one|two|three|four|five|six|seven|eight|nine|ten) lines?").unwrap(),
        Regex::new(r"([0-9]+)[-\s]line").unwrap(),
        Regex::new(r"(one|two|three|four|five|six|seven|eight|nine|ten)[-\s]line").unwrap(),
    ]
});

static WORD_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?:in |write |create |generate |make )?(?:exactly )?(?:just )?(?:only )?([0-9]+) words?").unwrap(),
        Regex::new(r"([0-9]+)[-\s]word").unwrap(),
    ]
});

// Unrecognized spelled-out numbers map to 2. Observable behavior, do not
// change.
fn word_to_count(word: &str) -> usize {
    match word {
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        _ => 2,
    }
}

fn capture_count(pattern: &Regex, prompt: &str) -> Option<usize> {
    let capture = pattern.captures(prompt)?;
    let matched = capture.get(1)?.as_str();
    let count = if matched.chars().all(|c| c.is_ascii_digit()) {
        // A number too large for usize is not a directive.
        matched.parse::<usize>().ok()?
    } else {
        word_to_count(matched)
    };
    // Neither is a count of zero.
    if count == 0 {
        return None;
    }
    Some(count)
}

/// Extracts an optional line/word count directive from a free-text prompt.
/// Never fails; prompts without a recognizable phrase yield
/// [`LengthRequirement::Default`].
pub fn parse_length_requirement(prompt: &str) -> LengthRequirement {
    let lowered = prompt.to_lowercase();

    for pattern in LINE_PATTERNS.iter() {
        if let Some(count) = capture_count(pattern, &lowered) {
            return LengthRequirement::Lines(count);
        }
    }

    for pattern in WORD_PATTERNS.iter() {
        if let Some(count) = capture_count(pattern, &lowered) {
            return LengthRequirement::Words(count);
        }
    }

    LengthRequirement::Default
}

/// Produces the instruction string sent to the generation backend. The backend
/// gives no hard guarantee of compliance; normalization enforces the bound
/// afterwards.
pub fn rewrite_prompt(original: &str, requirement: &LengthRequirement) -> String {
    match requirement {
        LengthRequirement::Lines(n) => {
            format!("Create exactly {} lines for: {}\n\nResponse:", n, original)
        }
        LengthRequirement::Words(n) => {
            format!("Create exactly {} words for: {}\n\nResponse:", n, original)
        }
        LengthRequirement::Default => original.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric_lines() {
        assert_eq!(
            parse_length_requirement("write a poem in 3 lines"),
            LengthRequirement::Lines(3)
        );
        assert_eq!(
            parse_length_requirement("3 lines about the sea"),
            LengthRequirement::Lines(3)
        );
    }

    #[test]
    fn test_parse_spelled_out_lines() {
        assert_eq!(
            parse_length_requirement("give me five lines on autumn"),
            LengthRequirement::Lines(5)
        );
        assert_eq!(
            parse_length_requirement("ONE LINE summary please"),
            LengthRequirement::Lines(1)
        );
    }

    #[test]
    fn test_parse_hyphenated_forms() {
        assert_eq!(
            parse_length_requirement("a 1-line tagline"),
            LengthRequirement::Lines(1)
        );
        assert_eq!(
            parse_length_requirement("a 10-word slogan"),
            LengthRequirement::Words(10)
        );
        assert_eq!(
            parse_length_requirement("two-line elevator pitch"),
            LengthRequirement::Lines(2)
        );
    }

    #[test]
    fn test_parse_numeric_words() {
        assert_eq!(
            parse_length_requirement("describe the ocean in 50 words"),
            LengthRequirement::Words(50)
        );
        assert_eq!(
            parse_length_requirement("exactly 1 word"),
            LengthRequirement::Words(1)
        );
    }

    #[test]
    fn test_lines_take_precedence_over_words() {
        // Both phrases present; line patterns run first.
        assert_eq!(
            parse_length_requirement("write 3 lines using 50 words"),
            LengthRequirement::Lines(3)
        );
    }

    #[test]
    fn test_parse_no_directive() {
        assert_eq!(
            parse_length_requirement("write a story about a dragon"),
            LengthRequirement::Default
        );
        assert_eq!(parse_length_requirement(""), LengthRequirement::Default);
        assert_eq!(
            parse_length_requirement("the lines at the store were long"),
            LengthRequirement::Default
        );
    }

    #[test]
    fn test_parse_zero_is_not_a_directive() {
        assert_eq!(
            parse_length_requirement("0 lines about nothing"),
            LengthRequirement::Default
        );
    }

    #[test]
    fn test_parse_overflowing_number_is_not_a_directive() {
        assert_eq!(
            parse_length_requirement("99999999999999999999999999 lines"),
            LengthRequirement::Default
        );
    }

    #[test]
    fn test_unknown_spelled_number_falls_back_to_two() {
        assert_eq!(word_to_count("eleven"), 2);
        assert_eq!(word_to_count("dozen"), 2);
    }

    #[test]
    fn test_non_ascii_digits_are_not_directives() {
        // Arabic-Indic and Devanagari digits match \d but carry no count.
        assert_eq!(
            parse_length_requirement("write ٣ lines about rain"),
            LengthRequirement::Default
        );
        assert_eq!(
            parse_length_requirement("a story in ३ words"),
            LengthRequirement::Default
        );
    }

    #[test]
    fn test_rewrite_lines() {
        let req = parse_length_requirement("Write a haiku in exactly 3 lines about rain");
        assert_eq!(req, LengthRequirement::Lines(3));
        assert_eq!(
            rewrite_prompt("Write a haiku in exactly 3 lines about rain", &req),
            "Create exactly 3 lines for: Write a haiku in exactly 3 lines about rain\n\nResponse:"
        );
    }

    #[test]
    fn test_rewrite_words() {
        assert_eq!(
            rewrite_prompt("the ocean", &LengthRequirement::Words(50)),
            "Create exactly 50 words for: the ocean\n\nResponse:"
        );
    }

    #[test]
    fn test_rewrite_default_is_identity() {
        assert_eq!(
            rewrite_prompt("tell me a joke", &LengthRequirement::Default),
            "tell me a joke"
        );
    }
}
