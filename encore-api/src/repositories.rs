use crate::endpoints::{artists::TopArtists, events::ListEvents};

pub struct ArtistRepository;

impl ArtistRepository {
    pub fn new() -> Self {
        Self {}
    }

    pub fn top(&self) -> TopArtists {
        TopArtists::default()
    }
}

#[derive(Default)]
pub struct EventRepository {
    city: String,
}

impl EventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_city(mut self, city: impl Into<String>) -> Self {
        self.city = city.into();
        self
    }

    pub fn search(&self, keywords: impl Into<String>) -> ListEvents {
        ListEvents::new(self.city.clone(), keywords)
    }
}
