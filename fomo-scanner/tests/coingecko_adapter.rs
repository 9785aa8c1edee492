//! HTTP contract of the CoinGecko adapter against a mock server.

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fomo_common::config::CoinGeckoConfig;
use fomo_scanner::data::{CoinGeckoAdapter, DataSource, ProviderError};

fn adapter(server: &MockServer, api_key: Option<&str>) -> CoinGeckoAdapter {
    CoinGeckoAdapter::from_config(&CoinGeckoConfig {
        api_key: api_key.map(str::to_string),
        base_url: Some(server.uri()),
        ..Default::default()
    })
}

#[tokio::test]
async fn test_markets_page_parsing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/coins/markets"))
        .and(query_param("vs_currency", "usd"))
        .and(query_param("order", "market_cap_desc"))
        .and(query_param("page", "2"))
        .and(query_param("per_page", "250"))
        .and(query_param("price_change_percentage", "1h,24h,7d"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "foo-token",
                "symbol": "FOO",
                "name": "Foo",
                "current_price": 0.42,
                "market_cap": 12000000,
                "market_cap_rank": 812,
                "total_volume": 350000,
                "price_change_percentage_24h": 3.1
            },
            { "id": "bare", "symbol": "bar", "name": "Bare" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let records = adapter(&server, None).fetch_page(2, 250).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].symbol, "foo");
    assert_eq!(records[0].volume, Some(350_000.0));
    assert_eq!(records[0].change_24h(), 3.1);
    assert_eq!(records[1].market_cap, None);
    assert_eq!(records[1].change_1h(), 0.0);
}

#[tokio::test]
async fn test_bad_record_does_not_sink_the_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/coins/markets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "alpha", "symbol": "ALP", "name": "Alpha", "current_price": 1.0, "total_volume": 900000 },
            { "id": "broken", "symbol": "BRK", "name": "Broken", "current_price": "n/a", "total_volume": 500000 },
            { "id": "gamma", "symbol": "GAM", "name": "Gamma", "current_price": 0.3, "total_volume": 700000 }
        ])))
        .mount(&server)
        .await;

    let records = adapter(&server, None).fetch_page(1, 250).await.unwrap();

    let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["alpha", "broken", "gamma"]);
    assert_eq!(records[1].price, None);
    assert_eq!(records[1].volume, Some(500_000.0));
    assert_eq!(records[2].price, Some(0.3));
}

#[tokio::test]
async fn test_api_key_is_sent_as_query_param() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/trending"))
        .and(query_param("x_cg_pro_api_key", "cg-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "coins": [ { "item": { "id": "foo" } }, { "item": { "id": "bar" } } ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let trending = adapter(&server, Some("cg-secret")).fetch_trending().await.unwrap();
    assert_eq!(trending, vec!["foo".to_string(), "bar".to_string()]);
}

#[tokio::test]
async fn test_history_uses_daily_interval() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/coins/foo/market_chart"))
        .and(query_param("days", "7"))
        .and(query_param("interval", "daily"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "prices": [[1, 1.0], [2, 1.1], [3, 1.2]],
            "total_volumes": [[1, 10.0], [2, 20.0], [3, 30.0]]
        })))
        .mount(&server)
        .await;

    let history = adapter(&server, None)
        .fetch_history("foo", 7)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(history.price_values(), vec![1.0, 1.1, 1.2]);
    assert_eq!(history.volume_values(), vec![10.0, 20.0, 30.0]);
}

#[tokio::test]
async fn test_not_found_is_absent_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/coins/ghost/tickers"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let book = adapter(&server, None).fetch_tickers("ghost").await.unwrap();
    assert!(book.is_none());
}

#[tokio::test]
async fn test_status_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/coins/limited/tickers"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/coins/locked/tickers"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/coins/down/tickers"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let adapter = adapter(&server, None);

    let limited = adapter.fetch_tickers("limited").await.unwrap_err();
    assert_eq!(
        limited,
        ProviderError::RateLimited {
            retry_after_secs: Some(12)
        }
    );
    assert!(limited.is_recoverable());

    let locked = adapter.fetch_tickers("locked").await.unwrap_err();
    assert!(matches!(locked, ProviderError::Auth(_)));
    assert!(!locked.is_recoverable());

    let down = adapter.fetch_tickers("down").await.unwrap_err();
    assert!(matches!(down, ProviderError::Unavailable(_)));
    assert!(down.is_recoverable());
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/coins/markets"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = adapter(&server, None).fetch_page(1, 250).await.unwrap_err();
    assert!(matches!(err, ProviderError::Parse(_)));
}
