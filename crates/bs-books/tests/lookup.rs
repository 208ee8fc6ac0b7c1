use bs_books::{BookClient, BookClientConfig, NOT_FOUND};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> BookClient {
    BookClient::new(BookClientConfig::with_base_url(&server.uri()).unwrap()).unwrap()
}

#[tokio::test]
async fn describes_first_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .and(query_param("title", "Идиот"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "numFound": 2,
            "docs": [
                {
                    "key": "/works/OL166894W",
                    "title": "Идиот",
                    "author_name": ["Fyodor Dostoevsky"],
                    "first_publish_year": 1868
                },
                { "key": "/works/OL2W", "author_name": ["Someone Else"] }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = client(&server).describe("Идиот").await.unwrap();
    assert_eq!(
        text,
        "Author: Fyodor Dostoevsky\nPublished: 1868\nKey: /works/OL166894W"
    );
}

#[tokio::test]
async fn empty_docs_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "numFound": 0, "docs": [] })))
        .mount(&server)
        .await;

    let client = client(&server);
    assert_eq!(client.lookup("nothing").await.unwrap(), None);
    assert_eq!(client.describe("nothing").await.unwrap(), NOT_FOUND);
}

#[tokio::test]
async fn error_status_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert_eq!(client(&server).describe("1984").await.unwrap(), NOT_FOUND);
}

#[tokio::test]
async fn missing_fields_render_placeholders() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "docs": [{ "key": "/works/OL3W" }]
        })))
        .mount(&server)
        .await;

    let info = client(&server).lookup("anonymous").await.unwrap().unwrap();
    assert!(info.authors.is_empty());
    assert_eq!(info.to_string(), "Author: \nPublished: unknown\nKey: /works/OL3W");
}
