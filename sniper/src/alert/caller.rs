use crate::credentials::PhoneAccount;
use sniper_data::CallDispatcher;
use sniper_integration::http::{HttpClient, OutputFormat};
use std::collections::HashMap;
use tracing::{error, info};

const VOICE_XML_URL: &str = "http://twimlets.com/message?Message%5B0%5D=Listing%20detected";

/// Twilio-backed telephony fan-out. Implements [`CallDispatcher`] so
/// `sniper-data`'s `TriggerExchange` can invoke it without this crate (or
/// `sniper-data`) knowing about Twilio at all.
pub struct Caller {
    accounts: Vec<PhoneAccount>,
    from_number: String,
    account_sid: String,
    auth_key: String,
    client: HttpClient,
}

impl Caller {
    pub fn new(accounts: Vec<PhoneAccount>, from_number: String, account_sid: String, auth_key: String) -> Self {
        Self {
            accounts,
            from_number,
            account_sid,
            auth_key,
            client: HttpClient::new(),
        }
    }

    async fn call_number(client: HttpClient, from_number: String, account_sid: String, auth_key: String, to: String) {
        let url = format!("https://api.twilio.com/2010-04-01/Accounts/{account_sid}/Calls.json");
        let mut form = HashMap::new();
        form.insert("To".to_string(), to.clone());
        form.insert("From".to_string(), from_number);
        form.insert("Url".to_string(), VOICE_XML_URL.to_string());

        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), format!("Basic {}", base64_basic_auth(&account_sid, &auth_key)));

        match client.post(&url, OutputFormat::Json, Some(headers), Some(form), None).await {
            Ok(_) => info!(number = %to, "call placed"),
            Err(e) => error!(number = %to, error = %e, "failed to place call"),
        }
    }
}

impl CallDispatcher for Caller {
    /// Fan out concurrently without awaiting: `call_all()` is invoked from a
    /// synchronous trait method, so each number's call is spawned rather than
    /// joined, matching §4.10's "for every account, concurrently".
    fn call_all(&self) {
        for account in &self.accounts {
            for number in account.numbers.clone() {
                let client = self.client.clone();
                let from_number = self.from_number.clone();
                let account_sid = self.account_sid.clone();
                let auth_key = self.auth_key.clone();
                tokio::spawn(async move {
                    Self::call_number(client, from_number, account_sid, auth_key, number).await;
                });
            }
        }
    }
}

fn base64_basic_auth(sid: &str, auth_key: &str) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(format!("{sid}:{auth_key}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_is_base64_of_sid_colon_key() {
        let encoded = base64_basic_auth("SID", "KEY");
        use base64::Engine;
        let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).unwrap();
        assert_eq!(decoded, b"SID:KEY");
    }
}
