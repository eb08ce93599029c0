//! Fixture types used across integration tests.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use fixy::Fixture;

#[derive(Debug, Default, Fixture)]
#[fixture(type_name = "clinic::Owner")]
pub struct Owner {
	#[fixture(id)]
	pub id: Option<i64>,
	pub name: String,
	pub age: u32,
	#[fixture(natural_key)]
	pub email: String,
}

#[derive(Debug, Default, Fixture)]
#[fixture(type_name = "clinic::Pet")]
pub struct Pet {
	#[fixture(id)]
	pub id: Option<i64>,
	#[fixture(natural_key)]
	pub name: String,
	pub species: String,
	pub owner: Option<Arc<Owner>>,
	pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Fixture)]
#[fixture(type_name = "clinic::Visit")]
pub struct Visit {
	#[fixture(id)]
	pub id: i64,
	pub pet: Option<Arc<Pet>>,
	pub vet_id: i64,
	pub notes: Vec<String>,
	#[fixture(rename = "visitedAt")]
	pub visited_at: Option<NaiveDateTime>,
}

#[derive(Debug, Default, Fixture)]
#[fixture(type_name = "clinic::Vet")]
pub struct Vet {
	#[fixture(id)]
	pub id: Option<i64>,
	pub name: String,
	#[fixture(readonly)]
	pub license: String,
	pub address: Address,
	#[fixture(setter = "set_specialties")]
	pub specialties: Vec<String>,
	#[fixture(skip)]
	pub cached_label: Option<String>,
}

impl Vet {
	/// Stores specialties sorted and without repeats.
	pub fn set_specialties(&mut self, mut specialties: Vec<String>) {
		specialties.sort();
		specialties.dedup();
		self.specialties = specialties;
	}
}

#[derive(Debug, Default, PartialEq, Fixture)]
#[fixture(type_name = "clinic::Address")]
pub struct Address {
	pub street: String,
	pub city: String,
}

/// A self-referencing type for cycle tests.
#[derive(Debug, Default, Fixture)]
#[fixture(type_name = "graph::Node")]
pub struct Node {
	pub name: String,
	pub next: Option<Arc<Node>>,
}

/// A type whose setter refuses some values.
#[derive(Debug, Default, Fixture)]
#[fixture(type_name = "clinic::Prescription")]
pub struct Prescription {
	#[fixture(id)]
	pub id: Option<i64>,
	pub drug: String,
	#[fixture(setter = "set_doses")]
	pub doses: i64,
}

impl Prescription {
	/// Stores the dose count, refusing negative counts.
	pub fn set_doses(&mut self, doses: i64) -> Result<(), String> {
		if doses < 0 {
			return Err(format!("dose count must not be negative, got {doses}"));
		}
		self.doses = doses;
		Ok(())
	}
}
