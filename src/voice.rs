//! Pulls a client, an amount and a description out of dictated text such
//! as "Charge $150 to Acme Corp for consulting". Audio capture happens
//! elsewhere; this only sees the transcript.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

/// First ASCII number, optionally prefixed by a currency marker ("r200",
/// "$200", "usd200"). Digits from other scripts are not amounts.
static AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:r|usd|\$)?([0-9]+(?:\.[0-9]{2})?)").expect("valid amount pattern"));

static CLIENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:to|for)\s+([a-zA-Z\s]+?)(?:\s+for|\s+at|\s*$)").expect("valid client pattern")
});

static DESCRIPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)for\s+([a-zA-Z\s]+?)(?:\s+to|\s*$)").expect("valid description pattern"));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceCommand {
    pub text: String,
    pub client: Option<String>,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
}

pub fn parse_voice_command(text: &str) -> VoiceCommand {
    let lowercase = text.to_lowercase();

    let amount = AMOUNT
        .captures(&lowercase)
        .and_then(|caps| Decimal::from_str(&caps[1]).ok());
    let client = capture_trimmed(&CLIENT, text);
    let description = capture_trimmed(&DESCRIPTION, text);

    VoiceCommand {
        text: text.to_string(),
        client,
        amount,
        description,
    }
}

fn capture_trimmed(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn full_command() {
        let cmd = parse_voice_command("Charge $150 to Acme Corp for consulting");
        assert_eq!(cmd.amount, Some(dec!(150)));
        assert_eq!(cmd.client.as_deref(), Some("Acme Corp"));
        assert_eq!(cmd.description.as_deref(), Some("consulting"));
        assert_eq!(cmd.text, "Charge $150 to Acme Corp for consulting");
    }

    #[test]
    fn currency_prefix_and_cents() {
        let cmd = parse_voice_command("Bill R200.50 to Jane");
        assert_eq!(cmd.amount, Some(dec!(200.50)));
        assert_eq!(cmd.client.as_deref(), Some("Jane"));
        assert_eq!(cmd.description, None);
    }

    #[test]
    fn nothing_recognised() {
        let cmd = parse_voice_command("hello there");
        assert_eq!(cmd.amount, None);
        assert_eq!(cmd.client, None);
        assert_eq!(cmd.description, None);
    }

    #[test]
    fn only_ascii_digits_count_as_amounts() {
        let cmd = parse_voice_command("Charge \u{0663}\u{0660}\u{0660} or $50 for hosting");
        assert_eq!(cmd.amount, Some(dec!(50)));
        assert_eq!(parse_voice_command("Charge \u{0663}\u{0660}\u{0660} for hosting").amount, None);
    }
}
