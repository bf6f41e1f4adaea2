use super::particles::ParticleFeatures;

/// Minimum convex hull area for a particle to count as the goal.
pub const GOAL_MIN_AREA: i32 = 800;

/// Pixel position of the goal, or [`NO_GOAL`] when nothing qualified.
pub type GoalPosition = (i32, i32);

/// Sentinel returned when no particle clears the hull-area threshold.
pub const NO_GOAL: GoalPosition = (-1, -1);

/// Reduce a particle snapshot to a single goal position. The returned x and
/// y are the maxima of centroid-x and centroid-y over all particles whose
/// convex hull area exceeds the threshold, tracked independently: they may
/// come from two different particles.
pub fn select_goal(particles: &[ParticleFeatures], min_hull_area: i32) -> GoalPosition {
    let mut qualified = false;
    let mut x = -1;
    let mut y = -1;

    for particle in particles {
        if particle.convex_hull_area > min_hull_area {
            qualified = true;
            if particle.centroid_x > x {
                x = particle.centroid_x;
            }
            if particle.centroid_y > y {
                y = particle.centroid_y;
            }
        }
    }

    if qualified {
        (x, y)
    } else {
        NO_GOAL
    }
}
