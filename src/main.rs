#![forbid(unsafe_code)]

mod util;

use actix_web::{middleware, web, App, HttpRequest, HttpResponse, HttpServer};
use anyhow::Context;
use openid_provider::{
    AuthContext, AuthResponse, AxAttributes, AxValue, Handled, OpenIdProvider, ProviderOptions,
    ProviderResult,
};

const DEFAULT_SOCKET: &str = "127.0.0.1:8080";

const AX_EMAIL: &str = "http://axschema.org/contact/email";

/// Stand-in auth handler: approves every checkid request as the configured
/// demo user. A real deployment renders a login flow here, stashes the
/// serialized context in the session and calls `complete_auth` from its
/// login-success route instead.
fn demo_check_auth(
    provider: &OpenIdProvider,
    _req: &HttpRequest,
    _interactive: bool,
    context: AuthContext,
) -> ProviderResult<HttpResponse> {
    let identity = dotenv::var("DEMO_USER").unwrap_or_else(|_| "demo".to_string());

    let mut attributes = AxAttributes::new();
    if let Ok(email) = dotenv::var("DEMO_EMAIL") {
        attributes.insert(AX_EMAIL.to_string(), AxValue::One(email));
    }

    log::info!("approving checkid request for `{}`", identity);
    provider.complete_auth(AuthResponse {
        context,
        identity,
        ax: Some(attributes),
    })
}

async fn openid_entry(
    req: HttpRequest,
    body: web::Bytes,
    provider: web::Data<OpenIdProvider>,
) -> ProviderResult<HttpResponse> {
    match provider.handle(&req, &body)? {
        Handled::Response(response) => Ok(response),
        Handled::Declined => Ok(HttpResponse::NotFound()
            .content_type("text/plain")
            .body("nothing here, the provider lives under its endpoint path")),
    }
}

fn create_logger_mw() -> middleware::Logger {
    middleware::Logger::new(r#"%Ts %bB %{r}a [%r -> %s] "%{Referer}i" "%{User-Agent}i""#)
}

fn provider_options(socket: &str) -> anyhow::Result<ProviderOptions> {
    let endpoint =
        dotenv::var("PROVIDER_ENDPOINT").unwrap_or_else(|_| format!("http://{socket}/openid"));
    let mut options = ProviderOptions::new(endpoint);

    if let Ok(secs) = dotenv::var("ASSOCIATION_EXPIRY_SECS") {
        options.association_expiry_secs = secs
            .parse()
            .context("couldn't parse ASSOCIATION_EXPIRY_SECS")?;
    }
    if let Ok(secs) = dotenv::var("NONCE_EXPIRY_SECS") {
        options.nonce_expiry_secs = secs.parse().context("couldn't parse NONCE_EXPIRY_SECS")?;
    }
    Ok(options)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    util::log::init_logger().context("couldn't initialize logger")?;
    log::info!("initialized logger");

    let socket = dotenv::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_SOCKET.to_string());
    let options = provider_options(&socket)?;

    let provider =
        OpenIdProvider::new(options, demo_check_auth).context("couldn't create provider")?;
    let endpoint = provider.endpoint().to_string();
    let data = web::Data::new(provider);
    log::info!("created provider for endpoint {}", endpoint);

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::clone(&data))
            .wrap(create_logger_mw())
            .default_service(web::route().to(openid_entry))
    });

    server = server
        .bind(&socket)
        .with_context(|| format!("couldn't bind to socket `{}`", socket))?;

    log::info!("server is listening on {}", socket);

    log::info!("here is what the endpoint speaks:");
    for (what, description) in [
        ("GET  (xrds/html)", "discovery document"),
        ("GET  ?u=<user>", "user discovery document"),
        ("GET  ?openid.mode=checkid_setup", "assertion flow"),
        ("POST openid.mode=associate", "association establishment"),
        ("POST openid.mode=check_authentication", "assertion verification"),
    ] {
        log::info!("- {} {}: {}", what, endpoint, description);
    }

    server
        .workers(1)
        .run()
        .await
        .context("error while running server")?;

    Ok(())
}
