//! Marketplace REST client implementation.

use std::sync::Arc;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use reqwest_tracing::TracingMiddleware;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::{HmacSigner, Signer, WalletCredentials};
use crate::error::{ApiError, BidderError};
use crate::market::api::{
    BidReceipt, LowListingSnapshot, MarketplaceApi, OpenBid, PlaceBidRequest,
};
use crate::market::endpoints;

/// Header carrying the acting wallet's address.
const ADDRESS_HEADER: &str = "X-Bidder-Address";
/// Header carrying the detached payload signature.
const SIGNATURE_HEADER: &str = "X-Bidder-Signature";

/// The default REST implementation of [`MarketplaceApi`].
///
/// Handles payload signing, transient-error retries, and response
/// classification. Rate limiting is *not* handled here; that is the
/// scheduler's job. This client surfaces throttling as
/// [`BidderError::RateLimited`] for the scheduler to react to.
///
/// # Example
///
/// ```rust,no_run
/// use nft_bidder::market::HttpMarketplaceClient;
///
/// let client = HttpMarketplaceClient::builder()
///     .user_agent("my-bidder/0.1")
///     .build();
/// ```
#[derive(Clone)]
pub struct HttpMarketplaceClient {
    http_client: ClientWithMiddleware,
    base_url: String,
    signer: Arc<dyn Signer>,
}

impl HttpMarketplaceClient {
    /// Create a client with default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new client builder.
    pub fn builder() -> HttpMarketplaceClientBuilder {
        HttpMarketplaceClientBuilder::new()
    }

    fn endpoint(&self, path: &str) -> Result<Url, BidderError> {
        let base = Url::parse(&self.base_url)?;
        Ok(base.join(path)?)
    }

    /// Make a signed request with a JSON body.
    async fn signed_send<T>(
        &self,
        method: reqwest::Method,
        path: &str,
        wallet: &WalletCredentials,
        body: Vec<u8>,
    ) -> Result<T, BidderError>
    where
        T: serde::de::DeserializeOwned,
    {
        let signature = self.signer.sign(wallet, &body)?;
        let url = self.endpoint(path)?;

        let response = self
            .http_client
            .request(method, url)
            .header(ADDRESS_HEADER, &wallet.action_address)
            .header(SIGNATURE_HEADER, signature)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        self.parse_response(response).await
    }

    /// Make an unsigned GET request with query parameters.
    async fn get_with_params<T, Q>(&self, path: &str, params: &Q) -> Result<T, BidderError>
    where
        T: serde::de::DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let mut url = self.endpoint(path)?;
        let query_string = serde_urlencoded::to_string(params)
            .map_err(|e| BidderError::InvalidResponse(e.to_string()))?;
        if !query_string.is_empty() {
            url.set_query(Some(&query_string));
        }

        let response = self.http_client.get(url).send().await?;
        self.parse_response(response).await
    }

    /// Parse a marketplace response envelope.
    async fn parse_response<T>(&self, response: reqwest::Response) -> Result<T, BidderError>
    where
        T: serde::de::DeserializeOwned,
    {
        let status = response.status();
        let body = response.text().await?;

        // The marketplace returns 200 with an error field for application
        // errors, so parse the envelope before looking at the status.
        let parsed: MarketplaceResponse<T> = serde_json::from_str(&body).map_err(|e| {
            BidderError::InvalidResponse(format!("Failed to parse response: {e}. Body: {body}"))
        })?;

        if let Some(error) = parsed.error {
            let api_error = ApiError::from_error_string(&error);
            if api_error.is_rate_limited() {
                return Err(BidderError::RateLimited {
                    retry_after_ms: api_error.retry_after().map(|d| d.as_millis() as u64),
                });
            }
            return Err(BidderError::Api(api_error));
        }

        parsed.data.ok_or_else(|| {
            if !status.is_success() {
                BidderError::InvalidResponse(format!("HTTP {status}: {body}"))
            } else {
                BidderError::InvalidResponse("Response missing 'data' field".to_string())
            }
        })
    }
}

impl Default for HttpMarketplaceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HttpMarketplaceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMarketplaceClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Builder for [`HttpMarketplaceClient`].
pub struct HttpMarketplaceClientBuilder {
    base_url: String,
    signer: Option<Arc<dyn Signer>>,
    user_agent: Option<String>,
    max_retries: u32,
}

impl HttpMarketplaceClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            base_url: endpoints::MARKETPLACE_BASE_URL.to_string(),
            signer: None,
            user_agent: None,
            max_retries: 3,
        }
    }

    /// Set the base URL (useful for testing with a mock server).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set a custom signer.
    pub fn signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the maximum number of retries for transient transport failures.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Build the client.
    pub fn build(self) -> HttpMarketplaceClient {
        let mut headers = HeaderMap::new();
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("nft-bidder/{}", env!("CARGO_PKG_VERSION")));
        let header_value = HeaderValue::from_str(&user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static("nft-bidder"));
        headers.insert(USER_AGENT, header_value);

        let reqwest_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(self.max_retries);

        let client = ClientBuilder::new(reqwest_client)
            .with(TracingMiddleware::default())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        HttpMarketplaceClient {
            http_client: client,
            base_url: self.base_url,
            signer: self.signer.unwrap_or_else(|| Arc::new(HmacSigner)),
        }
    }
}

impl Default for HttpMarketplaceClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal response envelope for marketplace responses.
#[derive(Debug, Deserialize)]
struct MarketplaceResponse<T> {
    error: Option<String>,
    data: Option<T>,
}

/// Wrapper for the open-bid lookup, whose result may be empty.
#[derive(Debug, Deserialize)]
struct OpenBidData {
    bid: Option<OpenBid>,
}

/// Wrapper for the listings feed.
#[derive(Debug, Deserialize)]
struct ListingsData {
    listings: Vec<LowListingSnapshot>,
}

#[derive(Debug, Serialize)]
struct OpenBidQuery<'a> {
    target: &'a str,
    bidder: &'a str,
}

#[derive(Debug, Serialize)]
struct ListingsQuery {
    limit: u32,
}

impl MarketplaceApi for HttpMarketplaceClient {
    async fn place_bid(
        &self,
        wallet: &WalletCredentials,
        request: &PlaceBidRequest,
    ) -> Result<BidReceipt, BidderError> {
        let body = serde_json::to_vec(request)?;
        self.signed_send(reqwest::Method::POST, endpoints::BIDS, wallet, body)
            .await
    }

    async fn cancel_bid(
        &self,
        wallet: &WalletCredentials,
        bid_id: &str,
    ) -> Result<(), BidderError> {
        // The cancel body carries only the bid id; the signature covers it.
        let body = serde_json::to_vec(&serde_json::json!({ "bid_id": bid_id }))?;
        let _: CancelData = self
            .signed_send(
                reqwest::Method::DELETE,
                &endpoints::bid_path(bid_id),
                wallet,
                body,
            )
            .await?;
        Ok(())
    }

    async fn open_bid_for(
        &self,
        wallet: &WalletCredentials,
        target: &str,
    ) -> Result<Option<OpenBid>, BidderError> {
        let query = OpenBidQuery {
            target,
            bidder: &wallet.action_address,
        };
        let data: OpenBidData = self.get_with_params(endpoints::OPEN_BID, &query).await?;
        Ok(data.bid)
    }

    async fn lowest_listings(
        &self,
        collection: &str,
        limit: u32,
    ) -> Result<Vec<LowListingSnapshot>, BidderError> {
        let data: ListingsData = self
            .get_with_params(
                &endpoints::collection_listings_path(collection),
                &ListingsQuery { limit },
            )
            .await?;
        Ok(data.listings)
    }
}

/// Cancel acknowledgement payload.
#[derive(Debug, Deserialize)]
struct CancelData {
    #[allow(dead_code)]
    cancelled: bool,
}
