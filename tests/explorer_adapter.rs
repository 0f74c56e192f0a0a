//! Explorer adapter against a mocked `module/action` API

use mockito::{mock, Matcher};

use chiliz_chat_server::blockchain::client::{ExplorerClient, ExplorerSource};

fn client_at(path: &str) -> ExplorerClient {
    ExplorerClient::new(&format!("{}{}", mockito::server_url(), path), "test-client").unwrap()
}

fn client() -> ExplorerClient {
    client_at("/api")
}

fn query(pairs: &[(&str, &str)]) -> Matcher {
    Matcher::AllOf(
        pairs
            .iter()
            .map(|(k, v)| Matcher::UrlEncoded(k.to_string(), v.to_string()))
            .collect(),
    )
}

#[tokio::test]
async fn test_balance_success_sends_client_header() {
    let address = "0x1111111111111111111111111111111111111111";
    let m = mock("GET", "/api")
        .match_query(query(&[("module", "account"), ("action", "balance"), ("address", address)]))
        .match_header("x-client-id", "test-client")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"1","message":"OK","result":"1000000000000000000"}"#)
        .create();

    let balance = client().get_balance(address).await;
    assert_eq!(balance.as_deref(), Some("1000000000000000000"));
    m.assert();
}

#[tokio::test]
async fn test_balance_failure_envelope_is_absence() {
    let address = "0x2222222222222222222222222222222222222222";
    let _m = mock("GET", "/api")
        .match_query(query(&[("action", "balance"), ("address", address)]))
        .with_status(200)
        .with_body(r#"{"status":"0","message":"NOTOK","result":null}"#)
        .create();

    assert!(client().get_balance(address).await.is_none());
}

#[tokio::test]
async fn test_http_error_is_absence() {
    let address = "0x3333333333333333333333333333333333333333";
    let _m = mock("GET", "/api")
        .match_query(query(&[("action", "balance"), ("address", address)]))
        .with_status(500)
        .with_body("upstream exploded")
        .create();

    assert!(client().get_balance(address).await.is_none());
}

#[tokio::test]
async fn test_malformed_input_never_hits_network() {
    // Own path so requests from concurrently running tests cannot land here
    let m = mock("GET", "/malformed/api")
        .match_query(Matcher::Any)
        .expect(0)
        .create();

    let c = client_at("/malformed/api");
    assert!(c.get_balance("0x1234").await.is_none());
    assert!(c.get_token_info("not an address").await.is_none());
    assert!(c.get_contract_info("").await.is_none());
    assert!(c.get_transaction_info("0xabc").await.is_none());
    m.assert();
}

#[tokio::test]
async fn test_token_info() {
    let address = "0x4444444444444444444444444444444444444444";
    let _m = mock("GET", "/api")
        .match_query(query(&[
            ("module", "token"),
            ("action", "getToken"),
            ("contractaddress", address),
        ]))
        .with_status(200)
        .with_body(
            r#"{"status":"1","result":{"name":"Paris Saint-Germain","symbol":"PSG","decimals":"0","totalSupply":"20000000","type":"ERC-20"}}"#,
        )
        .create();

    let token = client().get_token_info(address).await.unwrap();
    assert_eq!(token.symbol.as_deref(), Some("PSG"));
    assert_eq!(token.total_supply.as_deref(), Some("20000000"));
    assert_eq!(token.decimals.as_deref(), Some("0"));
}

#[tokio::test]
async fn test_contract_info_merges_source_and_abi() {
    let address = "0x5555555555555555555555555555555555555555";
    let _source = mock("GET", "/api")
        .match_query(query(&[("action", "getsourcecode"), ("address", address)]))
        .with_status(200)
        .with_body(
            r#"{"status":"1","result":[{"ContractName":"FanToken","CompilerVersion":"v0.8.4","OptimizationUsed":"1","LicenseType":"MIT","ABI":"Contract source code not verified"}]}"#,
        )
        .create();
    let _abi = mock("GET", "/api")
        .match_query(query(&[("action", "getabi"), ("address", address)]))
        .with_status(200)
        .with_body(r#"{"status":"1","result":"[{\"type\":\"function\",\"name\":\"totalSupply\"}]"}"#)
        .create();

    let info = client().get_contract_info(address).await.unwrap();
    assert_eq!(info.contract_name.as_deref(), Some("FanToken"));
    assert_eq!(info.compiler_version.as_deref(), Some("v0.8.4"));
    assert_eq!(info.optimization_used, Some(true));
    assert!(info.is_verified());
}

#[tokio::test]
async fn test_contract_info_absent_when_both_calls_fail() {
    let address = "0x6666666666666666666666666666666666666666";
    let m = mock("GET", "/api")
        .match_query(query(&[("address", address)]))
        .with_status(502)
        .expect(2)
        .create();

    assert!(client().get_contract_info(address).await.is_none());
    m.assert();
}

#[tokio::test]
async fn test_transaction_info() {
    let hash = "0x7777777777777777777777777777777777777777777777777777777777777777";
    let _m = mock("GET", "/api")
        .match_query(query(&[
            ("module", "transaction"),
            ("action", "gettxinfo"),
            ("txhash", hash),
        ]))
        .with_status(200)
        .with_body(
            r#"{"status":"1","result":{"blockNumber":"1234","from":"0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa","to":"0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb","value":"1000","gasUsed":"21000","success":true}}"#,
        )
        .create();

    let tx = client().get_transaction_info(hash).await.unwrap();
    assert_eq!(tx.hash.as_str(), hash);
    assert_eq!(tx.block_number.as_deref(), Some("1234"));
    assert_eq!(tx.gas_used.as_deref(), Some("21000"));
    assert_eq!(tx.success, Some(true));
}

#[tokio::test]
async fn test_search_token_keeps_only_tokens() {
    let _m = mock("GET", "/api/v2/search")
        .match_query(Matcher::UrlEncoded("q".into(), "pepper".into()))
        .with_status(200)
        .with_body(
            r#"{"items":[
                {"type":"token","name":"Pepper","symbol":"PEPPER","address":"0x8888888888888888888888888888888888888888","token_type":"ERC-20"},
                {"type":"address","name":"Pepper deployer","address":"0x9999999999999999999999999999999999999999"}
            ]}"#,
        )
        .create();

    let hits = client().search_token("$pepper").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].symbol.as_deref(), Some("PEPPER"));
}
