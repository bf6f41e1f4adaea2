mod goal;
mod particles;
mod threshold;

pub use goal::{select_goal, GoalPosition, GOAL_MIN_AREA, NO_GOAL};
pub use particles::{measure_particles, ParticleFeatures, MIN_PARTICLE_AREA};
pub use threshold::{rgb_to_hsv, threshold_hsv, ColorRange, MASK_ON};
