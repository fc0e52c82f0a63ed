use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z0-9._%+\-])[A-Za-z0-9._%+\-]*@([A-Za-z0-9.\-]+\.[A-Za-z]{2,})").expect("valid regex")
});

static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?\d[\d\s\-().]{6,}\d").expect("valid regex"));

/// Masks contact details before they are written to logs.
#[derive(Debug, Default, Clone)]
pub struct Redactor;

impl Redactor {
    pub fn new() -> Self {
        Self
    }

    pub fn redact(&self, input: &str) -> String {
        if input.is_empty() {
            return String::new();
        }

        let masked = EMAIL_PATTERN.replace_all(input, "$1***@$2");
        PHONE_PATTERN
            .replace_all(&masked, |caps: &regex::Captures<'_>| {
                let digits: String = caps[0].chars().filter(char::is_ascii_digit).collect();
                let tail = &digits[digits.len().saturating_sub(2)..];
                format!("[PHONE ..{}]", tail)
            })
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::Redactor;

    #[test]
    fn masks_email_local_part() {
        let redactor = Redactor::new();
        assert_eq!(redactor.redact("ana.lopez@acme.com"), "a***@acme.com");
        assert_eq!(
            redactor.redact("from ana@acme.com to luis@globex.io"),
            "from a***@acme.com to l***@globex.io"
        );
    }

    #[test]
    fn masks_phone_numbers_but_keeps_last_digits() {
        let redactor = Redactor::new();
        assert_eq!(redactor.redact("+502 5555-1234"), "[PHONE ..34]");
        assert_eq!(redactor.redact("no contact data"), "no contact data");
    }
}
