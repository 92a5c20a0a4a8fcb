//! Real landmark and city-centre locations for realistic test fixtures.
//!
//! Coordinates sourced from OpenStreetMap.

use itinerary_optimizer::Place;

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    /// Place with a slug id derived from the name and default visit settings.
    pub fn place(&self) -> Place {
        let id: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect();
        Place::new(id, self.name, self.lat, self.lng)
    }
}

// ============================================================================
// Paris landmarks (walkable in a day)
// ============================================================================

pub const PARIS_LANDMARKS: &[Location] = &[
    Location::new("Eiffel Tower", 48.8583701, 2.2944813),
    Location::new("Musee d'Orsay", 48.8599614, 2.3265614),
    Location::new("Louvre Museum", 48.8606111, 2.3376440),
    Location::new("Notre-Dame", 48.8529682, 2.3499021),
    Location::new("Pantheon", 48.8462218, 2.3464138),
    Location::new("Luxembourg Gardens", 48.8462217, 2.3371605),
    Location::new("Arc de Triomphe", 48.8737917, 2.2950275),
    Location::new("Sacre-Coeur", 48.8867046, 2.3431043),
    Location::new("Centre Pompidou", 48.8606560, 2.3522140),
    Location::new("Place des Vosges", 48.8555800, 2.3655500),
];

// ============================================================================
// Rome landmarks
// ============================================================================

pub const ROME_LANDMARKS: &[Location] = &[
    Location::new("Colosseum", 41.8902102, 12.4922309),
    Location::new("Roman Forum", 41.8924623, 12.4852560),
    Location::new("Pantheon Rome", 41.8986108, 12.4768729),
    Location::new("Trevi Fountain", 41.9009325, 12.4832866),
    Location::new("Spanish Steps", 41.9057800, 12.4823100),
    Location::new("Piazza Navona", 41.8992040, 12.4730730),
    Location::new("St Peter's Basilica", 41.9021667, 12.4539367),
];

// ============================================================================
// European city centres (multi-day, long legs)
// ============================================================================

pub const EUROPEAN_CITIES: &[Location] = &[
    Location::new("Paris", 48.8566140, 2.3522219),
    Location::new("Lyon", 45.7640430, 4.8356590),
    Location::new("Marseille", 43.2964820, 5.3697800),
    Location::new("Barcelona", 41.3850639, 2.1734035),
    Location::new("Madrid", 40.4167754, -3.7037902),
    Location::new("Milan", 45.4642035, 9.1899820),
    Location::new("Rome", 41.9027835, 12.4963655),
    Location::new("Berlin", 52.5200066, 13.4049540),
    Location::new("Amsterdam", 52.3675734, 4.9041389),
];

// ============================================================================
// Helpers
// ============================================================================

/// Places for every location in `locations`.
pub fn places(locations: &[Location]) -> Vec<Place> {
    locations.iter().map(Location::place).collect()
}
