use encore_api::{ApiError, CatalogClient, EventsClient, Request};

#[tokio::main]
pub async fn main() -> Result<(), ApiError> {
    let catalog = CatalogClient::new("access_token");
    let events = EventsClient::new("api_token");

    let artists = catalog.send(Request::artists().top().limit(5u32)).await?;

    let search = Request::events().in_city("Berlin");
    for name in artists.names() {
        let listing = events.send(search.search(name)).await?;
        for event in listing.values {
            println!("{} ({}) {}", event.name, event.starts_at, event.url);
        }
    }
    Ok(())
}
