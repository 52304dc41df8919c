mod common;

use pairing_server::crypto::{SignMethod, Wallet};
use pairing_server::domain::models::{Role, TokenGrant};
use pairing_server::domain::ports::TokenIssuer;
use pairing_server::token::JwtIssuer;
use reqwest::StatusCode;
use serde_json::{Value, json};

async fn request_pin(app: &common::TestApp, wallet: &Wallet) -> Value {
    let response = app
        .client
        .post(format!("{}/api/v1/auth/pin", app.addr))
        .json(&json!({"email": "a@b.com", "ecdsaPubKey": wallet.address().to_string()}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.unwrap()
}

async fn redeem(app: &common::TestApp, pin: &str, wallet: &Wallet) -> reqwest::Response {
    let signature = wallet.sign(pin, SignMethod::EthereumPrefix).unwrap();
    app.client
        .post(format!("{}/api/v1/auth/pin/redeem", app.addr))
        .json(&json!({
            "pin": pin,
            "pinSignature": signature.to_string(),
            "audiences": [common::AUDIENCE],
        }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_pin_is_redeemed_once() {
    let app = common::spawn_server().await;
    let wallet = Wallet::random().unwrap();

    let issued = request_pin(&app, &wallet).await;
    assert_eq!(issued["email"], "a@b.com");
    assert_eq!(issued["ecdsaPubKey"], wallet.address().to_string());
    let pin = issued["pin"].as_str().unwrap().to_string();
    assert_eq!(pin.len(), 6);

    let response = redeem(&app, &pin, &wallet).await;
    assert_eq!(response.status(), StatusCode::OK);
    let token: Value = response.json().await.unwrap();
    assert!(!token["idToken"].as_str().unwrap().is_empty());
    assert_eq!(token["type"], "bearer");

    let again = redeem(&app, &pin, &wallet).await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
    let body: Value = again.json().await.unwrap();
    assert_eq!(body["message"], "pin not found");
}

#[tokio::test]
async fn test_pin_wrong_signer_is_unauthorized() {
    let app = common::spawn_server().await;
    let wallet = Wallet::random().unwrap();
    let intruder = Wallet::random().unwrap();

    let issued = request_pin(&app, &wallet).await;
    let pin = issued["pin"].as_str().unwrap();

    let response = redeem(&app, pin, &intruder).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = redeem(&app, pin, &wallet).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_pin_request_validation() {
    let app = common::spawn_server().await;
    let response = app
        .client
        .post(format!("{}/api/v1/auth/pin", app.addr))
        .json(&json!({"email": "nope", "ecdsaPubKey": "0x12"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .client
        .post(format!("{}/api/v1/auth/pin", app.addr))
        .header("content-type", "application/json")
        .body("[]")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_token() {
    let app = common::spawn_server().await;
    let wallet = Wallet::random().unwrap();
    let issued = request_pin(&app, &wallet).await;
    let token: Value = redeem(&app, issued["pin"].as_str().unwrap(), &wallet)
        .await
        .json()
        .await
        .unwrap();

    let response = app
        .client
        .post(format!("{}/api/v1/auth/token/refresh", app.addr))
        .json(&json!({"refreshToken": token["refreshToken"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let refreshed: Value = response.json().await.unwrap();
    assert!(!refreshed["idToken"].as_str().unwrap().is_empty());

    // an access token is not accepted as refresh token
    let response = app
        .client
        .post(format!("{}/api/v1/auth/token/refresh", app.addr))
        .json(&json!({"refreshToken": token["idToken"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .client
        .post(format!("{}/api/v1/auth/token/verify", app.addr))
        .json(&json!({"token": "garbage"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_pin_listing() {
    let app = common::spawn_server().await;
    let wallet = Wallet::random().unwrap();
    request_pin(&app, &wallet).await;

    let url = format!("{}/api/v1/admin/pins", app.addr);
    let response = app.client.get(&url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let issuer = JwtIssuer::from_config(&app.config.jwt);
    let grant = |role| TokenGrant {
        audiences: vec![common::AUDIENCE.to_string()],
        account_id: uuid::Uuid::new_v4().to_string(),
        ecdsa_address: wallet.address().to_string(),
        smart_wallet_address: None,
        role,
    };

    let basic = issuer.create_token(&grant(Role::Basic)).unwrap();
    let response = app
        .client
        .get(&url)
        .bearer_auth(&basic.id_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin = issuer.create_token(&grant(Role::Admin)).unwrap();
    let response = app
        .client
        .get(&url)
        .bearer_auth(&admin.id_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let pins: Vec<Value> = response.json().await.unwrap();
    assert_eq!(pins.len(), 1);
    assert_eq!(pins[0]["email"], "a@b.com");
}
