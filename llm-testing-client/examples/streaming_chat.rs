use std::io::Write;

use futures::StreamExt;
use llm_testing_client::types::chat::{ChatRequest, ChatStreamEvent};
use llm_testing_client::ApiClient;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = ApiClient::builder().build()?;

    if !client.check_server_status().await {
        eprintln!("Backend is not reachable");
        return Ok(());
    }

    let request = ChatRequest::new()
        .user("Tell me a story about a Rust programmer.")
        .model("gpt-4o-mini")
        .temperature(0.7);

    let mut stream = client.chat_stream(request).await?;

    while let Some(event) = stream.next().await {
        match event {
            Ok(ChatStreamEvent::Chunk(chunk)) => {
                print!("{}", chunk.content);
                std::io::stdout().flush()?;
            }
            Ok(ChatStreamEvent::Completed) => println!(),
            Err(e) => eprintln!("\nChat Error: {}", e),
        }
    }

    Ok(())
}
