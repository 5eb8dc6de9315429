//! Id generation strategies.
//!
//! # Mental model
//!
//! [`SequentialIds`] hands out runs of consecutive ids so neighbouring registrations
//! land in the same region of the ordered store. A run starts at a random point of
//! the family's key space. Stumbling on an occupied id ends the run; the next call
//! starts over from a fresh random point instead of probing forward, which keeps
//! collisions from clustering and bounds the cost of a crowded neighbourhood.
//!
//! A call gives up with [`crate::IntIdError::Exhausted`] after
//! [`SequentialIds::DEFAULT_MAX_RUNS`] consecutive fresh runs end on an occupied id,
//! which in practice means the family is full.
//!
//! The run position is session state only. A new generator (or a process restart)
//! simply begins a new run; correctness rests on the occupancy check, not on
//! continuing a sequence.
//!
//! # Overrides
//!
//! Any [`IdGenerator`] may replace the default. The registry re-checks the returned
//! id and rejects a taken one with [`crate::IntIdError::IdInUse`], so a faulty
//! override cannot clobber an existing registration.

use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::error::{IntIdError, Result, StorageError};
use crate::family::{IdFamily, IntId};
use crate::store::IdStore;

/// Read-only view handed to generators.
pub struct GenerateCtx<'a, T: ?Sized> {
	family: IdFamily,
	store: &'a dyn IdStore<T>,
}

impl<'a, T: ?Sized> GenerateCtx<'a, T> {
	pub(crate) fn new(family: IdFamily, store: &'a dyn IdStore<T>) -> Self {
		Self { family, store }
	}

	pub fn family(&self) -> IdFamily {
		self.family
	}

	/// Returns true if `id` is already registered.
	pub fn is_taken(&self, id: IntId) -> std::result::Result<bool, StorageError> {
		self.store.contains(id)
	}

	/// Number of registered ids.
	pub fn len(&self) -> usize {
		self.store.len()
	}

	pub fn is_empty(&self) -> bool {
		self.store.is_empty()
	}
}

/// Produces ids for new registrations.
pub trait IdGenerator<T: ?Sized>: Send + Sync {
	/// Returns an id for `object`, ideally one not yet taken.
	fn generate_id(&mut self, ctx: &GenerateCtx<'_, T>, object: &Arc<T>) -> Result<IntId>;
}

type Seeder = Box<dyn FnMut(IntId) -> IntId + Send + Sync>;

/// Default generator: random starting points, sequential runs.
pub struct SequentialIds {
	next: Option<u64>,
	max_runs: u32,
	seeder: Seeder,
}

impl fmt::Debug for SequentialIds {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SequentialIds")
			.field("next", &self.next)
			.field("max_runs", &self.max_runs)
			.finish_non_exhaustive()
	}
}

impl Default for SequentialIds {
	fn default() -> Self {
		Self::new()
	}
}

impl SequentialIds {
	/// Fresh runs one call may start before giving up.
	pub const DEFAULT_MAX_RUNS: u32 = 128;

	/// Seeds runs from an entropy-seeded RNG.
	pub fn new() -> Self {
		Self::from_rng(StdRng::from_entropy())
	}

	/// Deterministic generator for a fixed seed.
	pub fn from_seed(seed: u64) -> Self {
		Self::from_rng(StdRng::seed_from_u64(seed))
	}

	/// Seeds runs uniformly from `[0, max]` using `rng`.
	pub fn from_rng<R: Rng + Send + Sync + 'static>(mut rng: R) -> Self {
		Self::with_seeder(move |max| IntId::new(rng.gen_range(0..=max.get())))
	}

	/// Uses `seeder` to pick run starting points. It receives the family maximum;
	/// larger results are clamped to it.
	pub fn with_seeder(seeder: impl FnMut(IntId) -> IntId + Send + Sync + 'static) -> Self {
		Self {
			next: None,
			max_runs: Self::DEFAULT_MAX_RUNS,
			seeder: Box::new(seeder),
		}
	}

	/// Caps the fresh runs one call may start. At least one run is always tried.
	pub fn with_max_runs(mut self, max_runs: u32) -> Self {
		self.max_runs = max_runs.max(1);
		self
	}

	/// Candidate the next call starts from, `None` before the first run or after a
	/// collision.
	pub fn next_hint(&self) -> Option<IntId> {
		self.next.map(IntId::new)
	}

	/// Drops the current run.
	pub fn reset(&mut self) {
		self.next = None;
	}

	/// Returns the next free id.
	pub fn next_id<T: ?Sized>(&mut self, ctx: &GenerateCtx<'_, T>) -> Result<IntId> {
		let max = ctx.family().max_id();
		let mut runs = 0;
		loop {
			let candidate = match self.next {
				Some(next) => next,
				None => {
					if runs == self.max_runs {
						return Err(IntIdError::Exhausted {
							family: ctx.family(),
							runs,
						});
					}
					runs += 1;
					let seed = (self.seeder)(max).min(max).get();
					trace!(seed, family = %ctx.family(), "starting id run");
					seed
				}
			};
			if candidate > max.get() {
				self.next = None;
				continue;
			}
			self.next = Some(candidate + 1);
			let id = IntId::new(candidate);
			if !ctx.is_taken(id)? {
				return Ok(id);
			}
			trace!(%id, "id run hit an occupied id");
			self.next = None;
		}
	}
}

impl<T: ?Sized> IdGenerator<T> for SequentialIds {
	fn generate_id(&mut self, ctx: &GenerateCtx<'_, T>, _object: &Arc<T>) -> Result<IntId> {
		self.next_id(ctx)
	}
}
