//! BDD step definitions for entity decoding and payload extraction

use cucumber::{given, then, when};
use serde_json::Value;

use status_proxy::entities;
use status_proxy::extractor;

use crate::world::{hydration_page, status_document, ProxyWorld};

fn nest(mut value: Value, levels: usize) -> Value {
    for _ in 0..levels {
        value = serde_json::json!({ "wrapper": value });
    }
    value
}

#[given(expr = "the text {string}")]
fn given_text(world: &mut ProxyWorld, text: String) {
    world.html = Some(text);
}

#[when("the text is decoded")]
fn decode_text(world: &mut ProxyWorld) {
    let text = world.html.as_deref().expect("text not set");
    world.decoded = Some(entities::decode(text).into_owned());
}

#[then(expr = "the decoded text is {string}")]
fn decoded_text_is(world: &mut ProxyWorld, expected: String) {
    assert_eq!(world.decoded.as_deref(), Some(expected.as_str()));
}

#[given(expr = "a page whose hydration script holds the status payload under {string}")]
fn hydration_payload_under(world: &mut ProxyWorld, path: String) {
    let mut value = status_document();
    for key in path.rsplit('.') {
        value = serde_json::json!({ key: value });
    }
    world.html = Some(hydration_page(&value.to_string()));
}

#[given("a page whose hydration script holds the entity-escaped status payload")]
fn hydration_payload_escaped(world: &mut ProxyWorld) {
    let escaped = status_document()
        .to_string()
        .replace('"', "&quot;")
        .replace('/', "&#x2F;");
    world.html = Some(hydration_page(&escaped));
}

#[given(expr = "a page with a {string} script holding the status payload")]
fn typed_script_payload(world: &mut ProxyWorld, mime: String) {
    world.html = Some(format!(
        r#"<html><head><script type="{mime}">{}</script></head><body></body></html>"#,
        status_document()
    ));
}

#[given("a page whose hydration script holds no payload but a JSON script does")]
fn hydration_without_payload(world: &mut ProxyWorld) {
    world.html = Some(format!(
        r#"<html><body><script id="__NEXT_DATA__" type="application/json">{{"props":{{"pageProps":{{}}}}}}</script><script type="application/json">{}</script></body></html>"#,
        status_document()
    ));
}

#[given(expr = "a page whose hydration script holds the status payload {int} levels deep")]
fn hydration_payload_deep(world: &mut ProxyWorld, levels: usize) {
    let value = nest(status_document(), levels);
    world.html = Some(hydration_page(&value.to_string()));
}

#[when("the payload is extracted from the page")]
fn extract_payload(world: &mut ProxyWorld) {
    let html = world.html.as_deref().expect("page not set");
    world.extracted = Some(extractor::extract(html));
}

#[then(expr = "a payload is recovered from {string}")]
fn payload_recovered_from(world: &mut ProxyWorld, source: String) {
    let extracted = world
        .extracted
        .as_ref()
        .expect("extraction not run")
        .as_ref()
        .expect("no payload recovered");
    assert_eq!(extracted.source.as_str(), source);
}

#[then(expr = "the recovered payload lists the service {string}")]
fn recovered_payload_lists(world: &mut ProxyWorld, name: String) {
    let extracted = world
        .extracted
        .as_ref()
        .and_then(Option::as_ref)
        .expect("no payload recovered");
    let service = extracted
        .payload
        .find_service(&name)
        .expect("service not found");
    assert_eq!(service.attributes.public_name, name);
}

#[then("no payload is recovered")]
fn no_payload(world: &mut ProxyWorld) {
    let extracted = world.extracted.as_ref().expect("extraction not run");
    assert!(extracted.is_none(), "unexpected payload: {:?}", extracted);
}
