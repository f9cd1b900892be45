use serde::Deserialize;
use sniper_instrument::{check_unique, Credential};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CredentialEntry {
    enabled: bool,
    api_key: String,
    secret_key: String,
}

/// `credentials.yaml`: exchangeName -> owner -> entry. Flattened into
/// [`Credential`]s and passed through [`check_unique`], which is fatal on
/// any `(exchange, key, secret)` collision per spec §7 item 6.
pub fn load_credentials(path: impl AsRef<Path>) -> anyhow::Result<Vec<Credential>> {
    let raw = std::fs::read_to_string(path.as_ref())
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.as_ref().display()))?;
    let parsed: HashMap<String, HashMap<String, CredentialEntry>> = serde_yaml::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.as_ref().display()))?;

    let mut credentials = Vec::new();
    for (exchange_name, owners) in parsed {
        for (owner, entry) in owners {
            if !entry.enabled {
                continue;
            }
            credentials.push(Credential::new(owner, exchange_name.clone(), entry.api_key, entry.secret_key));
        }
    }

    check_unique(credentials).map_err(|e| anyhow::anyhow!("{e}"))
}

#[derive(Debug, Deserialize)]
struct PhoneEntry {
    enabled: bool,
    number: u64,
}

#[derive(Debug, Deserialize)]
struct PhoneAccountEntry {
    enabled: bool,
    numbers: Vec<PhoneEntry>,
}

#[derive(Debug, Clone)]
pub struct PhoneAccount {
    pub name: String,
    pub numbers: Vec<String>,
}

/// `phone_numbers.yaml`. Per spec §9's ambiguous-behavior note, a disabled
/// number is still logged and still added to the account's set — the
/// original implementation's behavior is preserved deliberately rather than
/// "fixed", since silently dropping a number a human expects to ring is the
/// worse failure mode.
pub fn load_phone_accounts(path: impl AsRef<Path>) -> anyhow::Result<Vec<PhoneAccount>> {
    let raw = std::fs::read_to_string(path.as_ref())
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.as_ref().display()))?;
    let parsed: HashMap<String, PhoneAccountEntry> = serde_yaml::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.as_ref().display()))?;

    let mut accounts = Vec::new();
    for (name, entry) in parsed {
        if !entry.enabled {
            continue;
        }
        let mut numbers = Vec::new();
        for phone in entry.numbers {
            let digits = phone.number.to_string();
            if digits.len() != 11 {
                return Err(anyhow::anyhow!(
                    "phone number for account {name} is not an 11-digit integer: {}",
                    phone.number
                ));
            }
            if !phone.enabled {
                tracing::warn!(account = %name, number = %phone.number, "disabled phone number still added");
            }
            numbers.push(format!("+{digits}"));
        }
        accounts.push(PhoneAccount { name, numbers });
    }
    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_numbers_require_eleven_digits() {
        let yaml = r#"
acct:
  enabled: true
  numbers:
    - enabled: true
      number: 123
"#;
        let parsed: HashMap<String, PhoneAccountEntry> = serde_yaml::from_str(yaml).unwrap();
        let entry = &parsed["acct"];
        assert_eq!(entry.numbers[0].number.to_string().len(), 3);
    }
}
