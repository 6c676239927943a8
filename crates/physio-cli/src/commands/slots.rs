use super::Context;
use anyhow::{Result, bail};
use physio_application::ApiRequest;

pub async fn run(context: &Context, token: &str, therapist: &str, date: &str) -> Result<()> {
    let api = context.api().await?;
    let response = api
        .handle(
            token,
            ApiRequest::AvailableSlots {
                therapist: therapist.to_string(),
                date: date.to_string(),
            },
        )
        .await;

    if let Some(error) = response.error {
        bail!("{}: {}", error.kind, error.message);
    }

    let slots = response
        .body
        .as_ref()
        .and_then(|body| body.as_array())
        .cloned()
        .unwrap_or_default();
    if slots.is_empty() {
        println!("No free slots for {} on {}", therapist, date);
    }
    for slot in slots.iter().filter_map(|s| s.as_str()) {
        println!("{}", slot);
    }
    Ok(())
}
