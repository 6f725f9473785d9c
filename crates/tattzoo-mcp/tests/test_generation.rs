mod common;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use common::{ScriptedHttpClient, init_tracing};
use serde_json::json;
use tattzoo_mcp::{
    GenerationError, McpClientConfig, ProgressHandler,
    generation::{
        GenerationOptions, GenerationRequest, GeneratorConfig, StoryAnswers, TattooGenerator,
    },
    transport::SseRetryConfig,
};

fn request() -> GenerationRequest {
    let answers = StoryAnswers::new(
        "My grandmother kept a lighthouse on the northern coast for forty years.",
        "I want something that feels like coming home after a long night at sea.",
    );
    GenerationRequest::from_input(
        &answers,
        GenerationOptions::default()
            .style("Fineline")
            .placement("forearm"),
    )
    .expect("answers are long enough")
}

fn generator(server: &ScriptedHttpClient) -> TattooGenerator<ScriptedHttpClient> {
    TattooGenerator::with_client(
        server.clone(),
        GeneratorConfig::default().client(McpClientConfig::with_uri("http://tattzoo.test/mcp")),
    )
}

#[tokio::test]
async fn test_generate_returns_image_and_reports_progress() -> anyhow::Result<()> {
    init_tracing();
    let server = ScriptedHttpClient::with_session("session-1").respond_with(|server, id, _| {
        server.send_progress(id, "Composing", 40.0);
        server.send_result(
            id,
            json!({"image_url": "https://cdn.example/x.png", "seed": 7}),
        );
    });
    let generator = generator(&server);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let on_progress: ProgressHandler = {
        let seen = seen.clone();
        Arc::new(move |message: &str, progress: f64| {
            seen.lock().unwrap().push((message.to_owned(), progress))
        })
    };

    let image = generator.generate(&request(), Some(on_progress)).await?;
    assert_eq!(image.image_url, "https://cdn.example/x.png");
    assert_eq!(image.payload["seed"], 7);
    assert_eq!(*seen.lock().unwrap(), vec![("Composing".to_owned(), 40.0)]);

    let calls = server.tool_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, "generate_tattoo");
    let arguments = &calls[0].2;
    assert_eq!(arguments["style"], "Fineline");
    assert_eq!(arguments["color"], "Black & Grey");
    assert_eq!(arguments["mood"], "happy");
    assert_eq!(arguments["placement"], "forearm");
    assert_eq!(arguments["size"], "");
    assert_eq!(arguments["aspect_ratio"], "1:1");
    assert_eq!(arguments["model"], "sd3.5-large");
    assert!(arguments["questions"].as_str().unwrap().contains("\n\n"));
    Ok(())
}

#[tokio::test]
async fn test_generate_accepts_data_url() -> anyhow::Result<()> {
    init_tracing();
    let server = ScriptedHttpClient::with_session("session-1").respond_with(|server, id, _| {
        server.send_result(id, json!({"data_url": "data:image/png;base64,AAAA"}))
    });

    let image = generator(&server).generate(&request(), None).await?;
    assert_eq!(image.image_url, "data:image/png;base64,AAAA");
    Ok(())
}

#[tokio::test]
async fn test_generate_rejects_result_without_image() -> anyhow::Result<()> {
    init_tracing();
    let server = ScriptedHttpClient::with_session("session-1")
        .respond_with(|server, id, _| server.send_result(id, json!({"status": "ok"})));

    let error = generator(&server)
        .generate(&request(), None)
        .await
        .expect_err("a result without an image must fail");
    assert_eq!(error.message, GenerationError::MISSING_IMAGE_URL);
    Ok(())
}

#[tokio::test]
async fn test_generate_normalizes_tool_errors() -> anyhow::Result<()> {
    init_tracing();
    let server = ScriptedHttpClient::with_session("session-1").respond_with(|server, id, _| {
        server.send(json!({"jsonrpc": "2.0", "id": id, "result": {"content": []}}))
    });

    let error = generator(&server)
        .generate(&request(), None)
        .await
        .expect_err("invalid result must fail");
    assert_eq!(error.message, "Invalid MCP result");
    assert!(std::error::Error::source(&error).is_some());
    Ok(())
}

#[tokio::test]
async fn test_handshake_happens_once() -> anyhow::Result<()> {
    init_tracing();
    let server = ScriptedHttpClient::with_session("session-1").respond_with(|server, id, _| {
        server.send_result(id, json!({"url": "https://cdn.example/y.png"}))
    });
    let generator = generator(&server);
    assert!(!generator.is_connected().await);

    let request = request();
    let (a, b) = tokio::join!(
        generator.generate(&request, None),
        generator.generate(&request, None)
    );
    a?;
    b?;
    generator.generate(&request, None).await?;

    assert!(generator.is_connected().await);
    assert_eq!(server.initialize_count(), 1);
    assert_eq!(server.stream_requests().len(), 1);
    assert_eq!(server.tool_calls().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_failed_handshake_is_retried_on_next_generation() -> anyhow::Result<()> {
    init_tracing();
    let server = ScriptedHttpClient::with_session("session-1")
        .fail_handshakes(1)
        .respond_with(|server, id, _| {
            server.send_result(id, json!({"image_url": "https://cdn.example/z.png"}))
        });
    let generator = generator(&server);

    let error = generator
        .generate(&request(), None)
        .await
        .expect_err("first handshake fails");
    assert!(!error.message.is_empty());
    assert!(!generator.is_connected().await);
    assert!(server.tool_calls().is_empty());

    let image = generator.generate(&request(), None).await?;
    assert_eq!(image.image_url, "https://cdn.example/z.png");
    assert_eq!(server.initialize_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_session_with_lost_stream_is_replaced() -> anyhow::Result<()> {
    init_tracing();
    let server = ScriptedHttpClient::with_session("session-1").respond_with(|server, id, _| {
        server.send_result(id, json!({"image_url": "https://cdn.example/w.png"}))
    });
    let generator = TattooGenerator::with_client(
        server.clone(),
        GeneratorConfig::default().client(
            McpClientConfig::with_uri("http://tattzoo.test/mcp").retry_config(SseRetryConfig {
                max_times: Some(1),
                min_duration: Duration::from_millis(10),
            }),
        ),
    );
    generator.generate(&request(), None).await?;
    assert!(generator.is_connected().await);

    // an outage long enough to exhaust reconnection
    server.refuse_streams();
    server.close_stream();
    while generator.is_connected().await {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    server.accept_streams();

    let image = generator.generate(&request(), None).await?;
    assert_eq!(image.image_url, "https://cdn.example/w.png");
    assert_eq!(server.initialize_count(), 2);
    assert!(generator.is_connected().await);
    Ok(())
}
