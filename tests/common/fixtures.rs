//! Mock product API fixtures

use std::time::Duration;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Product detail document as the upstream API returns it
pub fn product_json(id: u64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": format!("Sản phẩm số {id}"),
        "url_key": format!("san-pham-{id}"),
        "price": 10000 + id,
        "description": format!("<div><p>Mô tả&nbsp;sản phẩm</p>\n<ul><li>Mã {id}</li></ul></div>"),
        "images": [
            { "base_url": format!("https://salt.example.com/{id}/a.jpg"), "large_url": "ignored" },
            { "base_url": format!("https://salt.example.com/{id}/b.jpg") }
        ],
        "inventory_status": "available"
    })
}

/// Answer `GET /products/<id>` with a product document
pub async fn mount_product(server: &MockServer, id: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/products/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(product_json(id)))
        .mount(server)
        .await;
}

/// Answer every `GET /products/<digits>` with the same product document
pub async fn mount_any_product(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/products/\d+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(product_json(1)))
        .mount(server)
        .await;
}

/// Answer `GET /products/<id>` with `status` every time
pub async fn mount_status(server: &MockServer, id: u64, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/products/{id}")))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Stall the first `times` requests for `id` long enough to hit the client timeout
///
/// Mount this before the mock that should answer afterwards; wiremock prefers
/// the earliest mounted match.
pub async fn mount_stalls(server: &MockServer, id: u64, times: u64, stall: Duration) {
    Mock::given(method("GET"))
        .and(path(format!("/products/{id}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(product_json(id))
                .set_delay(stall),
        )
        .up_to_n_times(times)
        .mount(server)
        .await;
}

/// Write identifiers as a one-column CSV with a header row
pub fn write_id_csv(dir: &std::path::Path, ids: impl IntoIterator<Item = u64>) -> std::path::PathBuf {
    let path = dir.join("products.csv");
    let mut contents = String::from("id\n");
    for id in ids {
        contents.push_str(&format!("{id}\n"));
    }
    std::fs::write(&path, contents).unwrap_or_else(|e| panic!("writing {}: {e}", path.display()));
    path
}
