use rss_relay::{
    connect_targets, BlogClient, CycleOutcome, FeedSource, FetchConfig, GuidStore,
    MetaWeblogClient, PostPayload, RelayError, RssFeedSource, RunConfig, RunContext,
    SchedulerLoop,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Mock feed</title>
    <link>http://example.com/</link>
    <description>Served by wiremock</description>
    <item>
      <guid>post-2</guid>
      <title>Newer</title>
      <link>http://example.com/2</link>
      <pubDate>Tue, 02 Jan 2024 10:00:00 GMT</pubDate>
      <description>second</description>
    </item>
    <item>
      <guid>post-1</guid>
      <title>Older</title>
      <link>http://example.com/1</link>
      <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>
      <description>first</description>
    </item>
  </channel>
</rss>"#;

const POST_ID_RESPONSE: &str = r#"<?xml version="1.0"?>
<methodResponse><params><param><value><string>42</string></value></param></params></methodResponse>"#;

const FAULT_RESPONSE: &str = r#"<?xml version="1.0"?>
<methodResponse><fault><value><struct>
  <member><name>faultCode</name><value><int>403</int></value></member>
  <member><name>faultString</name><value><string>Bad login</string></value></member>
</struct></value></fault></methodResponse>"#;

fn test_config() -> FetchConfig {
    FetchConfig {
        user_agent: "rss-relay-test/1.0".to_string(),
        timeout_seconds: 5,
        ..Default::default()
    }
}

fn payload() -> PostPayload {
    PostPayload {
        title: "Hello & welcome".to_string(),
        description: "<p>body</p>".to_string(),
        categories: Some(vec!["news".to_string()]),
    }
}

#[tokio::test]
async fn rss_source_fetches_and_parses() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/rss+xml")
                .set_body_string(RSS),
        )
        .mount(&mock_server)
        .await;

    let source = RssFeedSource::new(test_config()).unwrap();
    let entries = source
        .fetch_entries(&format!("{}/feed.xml", mock_server.uri()))
        .await
        .unwrap();

    let guids: Vec<&str> = entries.iter().map(|e| e.guid.as_str()).collect();
    assert_eq!(guids, vec!["post-2", "post-1"]);
    assert_eq!(entries[1].body, "first");
}

#[tokio::test]
async fn rss_source_reports_http_errors() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let source = RssFeedSource::new(test_config()).unwrap();
    let result = source
        .fetch_entries(&format!("{}/missing.xml", mock_server.uri()))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn rss_source_reports_malformed_documents() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let source = RssFeedSource::new(test_config()).unwrap();
    let err = source
        .fetch_entries(&format!("{}/feed.xml", mock_server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Parse(_)));
}

#[tokio::test]
async fn metaweblog_new_post_sends_xmlrpc_call() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/xmlrpc.php"))
        .and(header("content-type", "text/xml"))
        .and(body_string_contains("<methodName>metaWeblog.newPost</methodName>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(POST_ID_RESPONSE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client =
        MetaWeblogClient::new(&format!("{}/xmlrpc.php", mock_server.uri()), &test_config())
            .unwrap();
    let post_id = client
        .new_post("1", "admin", "secret", &payload(), true)
        .await
        .unwrap();
    assert_eq!(post_id, "42");

    let requests = mock_server.received_requests().await.unwrap();
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    assert!(body.contains("<string>Hello &amp; welcome</string>"));
    assert!(body.contains("<name>categories</name>"));
    assert!(body.contains("<string>admin</string>"));
    assert!(body.contains("<boolean>1</boolean>"));
}

#[tokio::test]
async fn metaweblog_fault_is_an_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FAULT_RESPONSE))
        .mount(&mock_server)
        .await;

    let client = MetaWeblogClient::new(&mock_server.uri(), &test_config()).unwrap();
    match client.new_post("1", "admin", "wrong", &payload(), true).await {
        Err(RelayError::Fault { code, message }) => {
            assert_eq!(code, 403);
            assert_eq!(message, "Bad login");
        }
        other => panic!("expected fault, got {:?}", other),
    }
}

#[tokio::test]
async fn metaweblog_server_error_is_an_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let client = MetaWeblogClient::new(&mock_server.uri(), &test_config()).unwrap();
    let err = client
        .new_post("1", "admin", "secret", &payload(), true)
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::XmlRpc(_)));
}

#[tokio::test]
async fn relays_feed_to_blog_end_to_end() {
    let feed_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
        .mount(&feed_server)
        .await;

    let blog_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/xmlrpc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(POST_ID_RESPONSE))
        // two entries on the first cycle, none on the second
        .expect(2)
        .mount(&blog_server)
        .await;

    let config = RunConfig::from_json_str(&format!(
        r#"{{
            "feeds": [{{"id": "mock", "url": "{}/feed.xml"}}],
            "target": [{{"id": "blog", "url": "{}/xmlrpc", "blogid": 1, "userid": "u", "password": "p"}}],
            "category_map": {{"blog": {{"mock": ["relayed"]}}}},
            "preferences": {{"update_interval": "10m", "postfix": "<p>{{link}}</p>"}}
        }}"#,
        feed_server.uri(),
        blog_server.uri()
    ))
    .unwrap();

    let dir = TempDir::new().unwrap();
    let guids = dir.path().join("guids.json");
    let fetch_config = test_config();

    let mut scheduler = SchedulerLoop::new(RunContext {
        interval: config.interval().unwrap(),
        store: GuidStore::load(&guids, &config.feeds),
        clients: connect_targets(&config.targets, &fetch_config),
        source: Box::new(RssFeedSource::new(fetch_config).unwrap()),
        config,
        cancel: CancellationToken::new(),
    });

    match scheduler.run_once().await {
        CycleOutcome::Completed {
            posts, committed, ..
        } => {
            assert_eq!(posts, 2);
            assert!(committed);
        }
        CycleOutcome::Aborted => panic!("cycle aborted"),
    }

    let requests = blog_server.received_requests().await.unwrap();
    let first = String::from_utf8(requests[0].body.clone()).unwrap();
    // oldest entry goes out first
    assert!(first.contains("<string>Older</string>"));
    assert!(first.contains("<string>relayed</string>"));
    assert!(first.contains("&lt;p&gt;http://example.com/1&lt;/p&gt;"));

    match scheduler.run_once().await {
        CycleOutcome::Completed { posts, .. } => assert_eq!(posts, 0),
        CycleOutcome::Aborted => panic!("cycle aborted"),
    }
}
