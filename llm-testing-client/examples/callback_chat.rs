use llm_testing_client::types::chat::ChatRequest;
use llm_testing_client::ApiClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = ApiClient::builder().build()?;

    let config = client.get_server_config().await?;
    println!("Connected to {:?} backend", config.environment());

    let request = ChatRequest::new()
        .system_prompt("You are a concise assistant.")
        .user("Summarize {{topic}} in one sentence.")
        .variable("topic", "ownership in Rust");

    client
        .send_chat_message(
            request,
            |chunk| print!("{}", chunk.content),
            |error| eprintln!("\nError {}: {}", error.status_code, error.detail),
            || println!("\n[done]"),
        )
        .await;

    Ok(())
}
