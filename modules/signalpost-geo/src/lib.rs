//! Location-resolution core: free text in, coordinates out.
//!
//! The extractor turns a post into a place-name candidate and the resolver
//! turns a candidate into coordinates, each through an ordered cascade of
//! strategies that short-circuits on the first hit. Expensive strategies
//! (fuzzy scan, remote services) run last, and their results are memoized
//! in a write-through cache so repeat names never hit the network twice.

pub mod cache;
pub mod extract;
pub mod fuzzy;
pub mod gazetteer;
pub mod generic;
pub mod llm;
pub mod ner;
pub mod nominatim;
pub mod resolve;

pub use cache::{CacheLookup, GeocodeCache};
pub use extract::LocationExtractor;
pub use gazetteer::{Gazetteer, GazetteerAppendLog, GazetteerEntry};
pub use llm::LlmLocator;
pub use nominatim::NominatimClient;
pub use resolve::{ForwardGeocoder, LocationModel, Resolution, Resolver};
