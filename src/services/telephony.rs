use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

/// Inputs a telephony vendor needs to bridge a live call into the automation
/// audio stream.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CallConnectRequest {
    #[validate(length(min = 1))]
    pub call_id: String,
    #[validate(length(min = 1))]
    pub stream_url: String,
    pub greeting: Option<String>,
}

/// One capability, one method. New vendors implement this trait; shared code
/// never branches on a vendor name.
pub trait TelephonyProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Vendor-specific call-connect document returned to the gateway.
    fn connect_response(&self, request: &CallConnectRequest) -> JsonValue;
}

/// Twilio answers with TwiML; the gateway expects it wrapped in JSON.
pub struct TwilioProvider;

impl TelephonyProvider for TwilioProvider {
    fn name(&self) -> &'static str {
        "twilio"
    }

    fn connect_response(&self, request: &CallConnectRequest) -> JsonValue {
        let say = request
            .greeting
            .as_deref()
            .map(|g| format!("<Say>{}</Say>", g))
            .unwrap_or_default();
        json!({
            "twiml": format!(
                "<Response>{}<Connect><Stream url=\"{}\"/></Connect></Response>",
                say, request.stream_url
            )
        })
    }
}

/// Vonage answers with an NCCO action array.
pub struct VonageProvider;

impl TelephonyProvider for VonageProvider {
    fn name(&self) -> &'static str {
        "vonage"
    }

    fn connect_response(&self, request: &CallConnectRequest) -> JsonValue {
        let mut ncco = Vec::new();
        if let Some(greeting) = &request.greeting {
            ncco.push(json!({ "action": "talk", "text": greeting }));
        }
        ncco.push(json!({
            "action": "connect",
            "endpoint": [{
                "type": "websocket",
                "uri": request.stream_url,
                "content-type": "audio/l16;rate=16000",
                "headers": { "call_id": request.call_id }
            }]
        }));
        JsonValue::Array(ncco)
    }
}

pub fn provider_registry() -> HashMap<&'static str, Arc<dyn TelephonyProvider>> {
    let providers: Vec<Arc<dyn TelephonyProvider>> =
        vec![Arc::new(TwilioProvider), Arc::new(VonageProvider)];
    providers.into_iter().map(|p| (p.name(), p)).collect()
}
