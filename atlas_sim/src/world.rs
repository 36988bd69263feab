// atlas_sim/src/world.rs

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// =========================================================================
// == World Description ==
// =========================================================================

/// A solid obstacle inside the arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Obstacle {
    /// Axis-aligned box.
    Rect { min: [f64; 2], max: [f64; 2] },
    Circle { center: [f64; 2], radius: f64 },
}

/// Rectangular arena with walls on its border and obstacles inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Lower-left and upper-right corners of the arena interior.
    pub arena_min: [f64; 2],
    pub arena_max: [f64; 2],
    pub obstacles: Vec<Obstacle>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            arena_min: [-4.0, -3.0],
            arena_max: [4.0, 3.0],
            obstacles: vec![
                Obstacle::Circle {
                    center: [1.5, 1.0],
                    radius: 0.2,
                },
                Obstacle::Circle {
                    center: [-2.0, -1.2],
                    radius: 0.15,
                },
                Obstacle::Rect {
                    min: [-1.0, 1.6],
                    max: [0.2, 2.0],
                },
                Obstacle::Rect {
                    min: [2.4, -2.0],
                    max: [3.0, -0.8],
                },
            ],
        }
    }
}

// =========================================================================
// == Ray Casting ==
// =========================================================================

/// Ground truth geometry used by the simulated robot.
#[derive(Debug, Clone, PartialEq)]
pub struct World {
    config: WorldConfig,
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        Self { config }
    }

    /// True when `point` is inside the arena and outside every obstacle.
    pub fn is_free(&self, point: &Vector2<f64>) -> bool {
        let [min_x, min_y] = self.config.arena_min;
        let [max_x, max_y] = self.config.arena_max;
        let inside = point.x > min_x && point.x < max_x && point.y > min_y && point.y < max_y;
        inside
            && self.config.obstacles.iter().all(|o| match o {
                Obstacle::Rect { min, max } => {
                    !(point.x >= min[0] && point.x <= max[0] && point.y >= min[1] && point.y <= max[1])
                }
                Obstacle::Circle { center, radius } => {
                    (point.x - center[0]).hypot(point.y - center[1]) > *radius
                }
            })
    }

    /// Distance from `origin` along `angle` to the first surface.
    ///
    /// The origin is assumed to lie inside the arena, so the ray always ends
    /// on a wall at the latest.
    pub fn cast(&self, origin: &Vector2<f64>, angle: f64) -> f64 {
        let direction = Vector2::new(angle.cos(), angle.sin());
        let walls = Self::exit_distance(origin, &direction, self.config.arena_min, self.config.arena_max);
        self.config
            .obstacles
            .iter()
            .filter_map(|o| match o {
                Obstacle::Rect { min, max } => Self::slab_entry(origin, &direction, *min, *max),
                Obstacle::Circle { center, radius } => {
                    Self::circle_entry(origin, &direction, Vector2::new(center[0], center[1]), *radius)
                }
            })
            .fold(walls, f64::min)
    }

    /// Where a ray starting inside a box leaves it.
    fn exit_distance(origin: &Vector2<f64>, direction: &Vector2<f64>, min: [f64; 2], max: [f64; 2]) -> f64 {
        let axis = |o: f64, d: f64, lo: f64, hi: f64| {
            if d > 0.0 {
                (hi - o) / d
            } else if d < 0.0 {
                (lo - o) / d
            } else {
                f64::INFINITY
            }
        };
        axis(origin.x, direction.x, min[0], max[0])
            .min(axis(origin.y, direction.y, min[1], max[1]))
            .max(0.0)
    }

    /// Slab test against a box the ray starts outside of.
    fn slab_entry(origin: &Vector2<f64>, direction: &Vector2<f64>, min: [f64; 2], max: [f64; 2]) -> Option<f64> {
        let mut t_near = f64::NEG_INFINITY;
        let mut t_far = f64::INFINITY;
        for axis in 0..2 {
            let (o, d) = (origin[axis], direction[axis]);
            if d.abs() < 1e-12 {
                if o < min[axis] || o > max[axis] {
                    return None;
                }
                continue;
            }
            let (t0, t1) = ((min[axis] - o) / d, (max[axis] - o) / d);
            t_near = t_near.max(t0.min(t1));
            t_far = t_far.min(t0.max(t1));
        }
        (t_near <= t_far && t_near > 0.0).then_some(t_near)
    }

    fn circle_entry(origin: &Vector2<f64>, direction: &Vector2<f64>, center: Vector2<f64>, radius: f64) -> Option<f64> {
        let f = origin - center;
        let b = f.dot(direction);
        let disc = b * b - (f.norm_squared() - radius * radius);
        if disc < 0.0 {
            return None;
        }
        let t = -b - disc.sqrt();
        (t > 0.0).then_some(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn empty_room() -> World {
        World::new(WorldConfig {
            arena_min: [-2.0, -1.0],
            arena_max: [3.0, 1.0],
            obstacles: Vec::new(),
        })
    }

    #[test]
    fn test_walls_bound_every_ray() {
        let world = empty_room();
        let origin = Vector2::zeros();
        assert_abs_diff_eq!(world.cast(&origin, 0.0), 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(world.cast(&origin, PI), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(world.cast(&origin, FRAC_PI_2), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(world.cast(&origin, PI / 4.0), 2f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_obstacles_occlude_walls() {
        let world = World::new(WorldConfig {
            arena_min: [-5.0, -5.0],
            arena_max: [5.0, 5.0],
            obstacles: vec![
                Obstacle::Circle {
                    center: [2.0, 0.0],
                    radius: 0.5,
                },
                Obstacle::Rect {
                    min: [-3.0, -1.0],
                    max: [-2.0, 1.0],
                },
            ],
        });
        let origin = Vector2::zeros();
        assert_abs_diff_eq!(world.cast(&origin, 0.0), 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(world.cast(&origin, PI), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(world.cast(&origin, FRAC_PI_2), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_free_space_query() {
        let world = World::new(WorldConfig::default());
        assert!(world.is_free(&Vector2::zeros()));
        assert!(!world.is_free(&Vector2::new(1.5, 1.0)));
        assert!(!world.is_free(&Vector2::new(10.0, 0.0)));
    }

    #[test]
    fn test_obstacles_parse_from_toml() {
        let config: WorldConfig = toml::from_str(
            r#"
            arena_min = [-1.0, -1.0]
            arena_max = [1.0, 1.0]

            [[obstacles]]
            shape = "circle"
            center = [0.5, 0.0]
            radius = 0.1

            [[obstacles]]
            shape = "rect"
            min = [-0.8, -0.8]
            max = [-0.6, -0.6]
            "#,
        )
        .expect("parse");
        assert_eq!(config.obstacles.len(), 2);
        assert!(matches!(config.obstacles[1], Obstacle::Rect { .. }));
    }
}
