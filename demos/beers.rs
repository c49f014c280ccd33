//! A small beer-review service built on taproom.
//!
//! ```text
//! cargo run --example beers
//! curl -s localhost:3000/v1/beers -d '{"name":"Punk IPA","brewery":"BrewDog","style":"IPA","abv":5.4,"short_desc":"hoppy"}'
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use taproom::middleware::{Errors, Logger, Metrics, Panics};
use taproom::{
    App, Checker, Context, Error, FieldErrors, InMemoryMetrics, Page, Request, Response, Server,
    ServerConfig, ServerError, Validate, decode, health, logging, respond, shutdown,
};

// ── Core ──────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
enum BeerError {
    #[error("beer not found")]
    NotFound,
    #[error("ID is not in its proper form")]
    InvalidId,
    #[error("validating data: {0}")]
    Validation(FieldErrors),
}

impl From<BeerError> for Error {
    fn from(err: BeerError) -> Self {
        match err {
            BeerError::NotFound => Error::not_found(err.to_string()),
            BeerError::InvalidId => Error::invalid_id(err.to_string()),
            BeerError::Validation(fields) => Error::Validation(fields),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct NewBeer {
    name: String,
    brewery: String,
    style: String,
    abv: f32,
    short_desc: String,
}

impl Validate for NewBeer {
    fn validate(&self) -> FieldErrors {
        Checker::new()
            .required("name", &self.name)
            .required("brewery", &self.brewery)
            .required("style", &self.style)
            .required_number("abv", self.abv)
            .range("abv", self.abv, 0.0, 100.0)
            .required("short_desc", &self.short_desc)
            .finish()
    }
}

#[derive(Clone, Debug, Serialize)]
struct Beer {
    id: String,
    name: String,
    brewery: String,
    style: String,
    abv: f32,
    short_desc: String,
    score: f32,
    created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct NewReview {
    user_id: String,
    score: f32,
    comment: String,
}

impl Validate for NewReview {
    fn validate(&self) -> FieldErrors {
        Checker::new()
            .required("user_id", &self.user_id)
            .uuid("user_id", &self.user_id)
            .required_number("score", self.score)
            .range("score", self.score, 0.0, 5.0)
            .required("comment", &self.comment)
            .finish()
    }
}

#[derive(Clone, Debug, Serialize)]
struct Review {
    id: String,
    beer_id: String,
    user_id: String,
    score: f32,
    comment: String,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Store {
    beers: Vec<Beer>,
    reviews: Vec<Review>,
}

/// In-memory beer storage. Listings come back in creation order.
#[derive(Default)]
struct BeerCore {
    store: RwLock<Store>,
}

fn check_id(id: &str) -> Result<(), BeerError> {
    Uuid::parse_str(id).map(|_| ()).map_err(|_| BeerError::InvalidId)
}

fn page_of<T: Clone>(items: impl Iterator<Item = T>, page: Page) -> Vec<T> {
    items.skip(page.offset()).take(page.size as usize).collect()
}

impl BeerCore {
    async fn create(&self, nb: NewBeer, now: DateTime<Utc>) -> Result<Beer, BeerError> {
        let errors = nb.validate();
        if !errors.is_empty() {
            return Err(BeerError::Validation(errors));
        }

        let beer = Beer {
            id: Uuid::now_v7().to_string(),
            name: nb.name,
            brewery: nb.brewery,
            style: nb.style,
            abv: nb.abv,
            short_desc: nb.short_desc,
            score: 0.0,
            created_at: now,
        };
        self.store.write().await.beers.push(beer.clone());
        Ok(beer)
    }

    /// Fails when the store stays locked for too long to serve a read.
    async fn ping(&self) -> Result<(), tokio::time::error::Elapsed> {
        tokio::time::timeout(Duration::from_secs(1), self.store.read()).await.map(|_| ())
    }

    async fn query_by_id(&self, id: &str) -> Result<Beer, BeerError> {
        check_id(id)?;
        let store = self.store.read().await;
        store.beers.iter().find(|b| b.id == id).cloned().ok_or(BeerError::NotFound)
    }

    async fn query(&self, page: Page) -> Vec<Beer> {
        page_of(self.store.read().await.beers.iter().cloned(), page)
    }

    async fn create_review(
        &self,
        beer_id: &str,
        nr: NewReview,
        now: DateTime<Utc>,
    ) -> Result<Review, BeerError> {
        check_id(beer_id)?;
        let errors = nr.validate();
        if !errors.is_empty() {
            return Err(BeerError::Validation(errors));
        }

        let mut store = self.store.write().await;
        if !store.beers.iter().any(|b| b.id == beer_id) {
            return Err(BeerError::NotFound);
        }

        let review = Review {
            id: Uuid::now_v7().to_string(),
            beer_id: beer_id.to_owned(),
            user_id: nr.user_id,
            score: nr.score,
            comment: nr.comment,
            created_at: now,
        };
        store.reviews.push(review.clone());

        let (sum, count) = store
            .reviews
            .iter()
            .filter(|r| r.beer_id == beer_id)
            .fold((0.0_f32, 0_u32), |(s, c), r| (s + r.score, c + 1));
        if let Some(beer) = store.beers.iter_mut().find(|b| b.id == beer_id) {
            beer.score = sum / count as f32;
        }

        Ok(review)
    }

    async fn query_reviews(&self, beer_id: &str, page: Page) -> Result<Vec<Review>, BeerError> {
        check_id(beer_id)?;
        let store = self.store.read().await;
        if !store.beers.iter().any(|b| b.id == beer_id) {
            return Err(BeerError::NotFound);
        }
        Ok(page_of(store.reviews.iter().filter(|r| r.beer_id == beer_id).cloned(), page))
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn create(core: Arc<BeerCore>, ctx: Context, req: Request) -> Result<Response, Error> {
    let nb: NewBeer = decode(&req)?;
    let beer = core.create(nb, ctx.values().now()).await?;
    respond(&ctx, &beer, StatusCode::CREATED)
}

async fn query_by_id(core: Arc<BeerCore>, ctx: Context, req: Request) -> Result<Response, Error> {
    let id = req.param("id").unwrap_or_default();
    let beer = core.query_by_id(id).await?;
    respond(&ctx, &beer, StatusCode::OK)
}

async fn query(core: Arc<BeerCore>, ctx: Context, req: Request) -> Result<Response, Error> {
    let page = Page::from_request(&req)?;
    let beers = core.query(page).await;
    respond_list(&ctx, &beers)
}

async fn create_review(core: Arc<BeerCore>, ctx: Context, req: Request) -> Result<Response, Error> {
    let nr: NewReview = decode(&req)?;
    let id = req.param("id").unwrap_or_default();
    let review = core.create_review(id, nr, ctx.values().now()).await?;
    respond(&ctx, &review, StatusCode::CREATED)
}

async fn query_reviews(core: Arc<BeerCore>, ctx: Context, req: Request) -> Result<Response, Error> {
    let page = Page::from_request(&req)?;
    let id = req.param("id").unwrap_or_default();
    let reviews = core.query_reviews(id, page).await?;
    respond_list(&ctx, &reviews)
}

fn respond_list<T: Serialize>(ctx: &Context, items: &[T]) -> Result<Response, Error> {
    if items.is_empty() {
        return respond(ctx, &(), StatusCode::NO_CONTENT);
    }
    respond(ctx, items, StatusCode::OK)
}

/// Binds `core` into a handler.
fn with_core<F, Fut>(
    core: &Arc<BeerCore>,
    f: F,
) -> impl Fn(Context, Request) -> Fut + Send + Sync + 'static
where
    F: Fn(Arc<BeerCore>, Context, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, Error>> + Send + 'static,
{
    let core = Arc::clone(core);
    move |ctx, req| f(Arc::clone(&core), ctx, req)
}

fn routes(app: App, core: &Arc<BeerCore>, metrics: &Arc<InMemoryMetrics>) -> App {
    let metrics = Arc::clone(metrics);
    let ready = Arc::clone(core);
    app.get("v1", "/liveness", health::liveness)
        .get(
            "v1",
            "/readiness",
            health::readiness_with(move || {
                let core = Arc::clone(&ready);
                async move { core.ping().await }
            }),
        )
        .get("v1", "/metrics", move |ctx: Context, _req: Request| {
            let snapshot = metrics.snapshot();
            async move { respond(&ctx, &snapshot, StatusCode::OK) }
        })
        .get("v1", "/beers", with_core(core, query))
        .post("v1", "/beers", with_core(core, create))
        .get("v1", "/beers/:id", with_core(core, query_by_id))
        .post("v1", "/beers/:id/reviews", with_core(core, create_review))
        .get("v1", "/beers/:id/reviews", with_core(core, query_reviews))
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let config = ServerConfig::from_env()?;
    logging::init(&config.log)?;

    let metrics = Arc::new(InMemoryMetrics::new());
    let core = Arc::new(BeerCore::default());

    let (tx, rx) = shutdown::channel();
    let app = App::builder(tx)
        .metrics(metrics.clone())
        .wrap(Logger)
        .wrap(Errors)
        .wrap(Metrics)
        .wrap(Panics)
        .build();
    let app = routes(app, &core, &metrics);

    info!(addr = %config.addr, "starting beers service");
    let signal = Server::from_config(&config).serve(app, rx).await?;
    info!(?signal, "beers service stopped");
    Ok(())
}
