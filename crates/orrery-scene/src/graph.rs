//! Scene graph: an owned tree of transformed nodes.
//!
//! Every node owns its children. Nodes are addressed by [`NodePath`], the
//! child indices from the root, which stay valid because the tree's shape
//! never changes after composition.

use glam::{Mat4, Quat, Vec3};

use crate::composer::BodyMaterial;

/// Child indices leading from the root to a node.
pub type NodePath = Vec<usize>;

/// Local translation, rotation, and scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Self::IDENTITY
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// What a node draws or emits.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Group,
    /// Inward-facing sky sphere.
    Skybox { radius: f32, tint: f32 },
    AmbientLight,
    PointLight,
    Starfield,
    /// Index into the composed scene's particle fields.
    Field(usize),
    /// Sphere mesh of body `index` in the registry.
    Body {
        index: usize,
        radius: f32,
        material: BodyMaterial,
    },
    /// Sphere mesh of the moon orbiting body `parent`.
    Moon {
        parent: usize,
        radius: f32,
        material: BodyMaterial,
    },
    /// Flat annulus guide marking an orbit, lying in the XZ plane.
    OrbitGuide {
        inner_radius: f32,
        outer_radius: f32,
        color: Vec3,
        opacity: f32,
    },
    /// Textured ring annulus around a ringed body.
    RingAnnulus {
        inner_radius: f32,
        outer_radius: f32,
    },
}

/// A node in the scene tree.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub kind: NodeKind,
    pub transform: Transform,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            transform: Transform::IDENTITY,
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Append a child and return its index.
    pub fn add_child(&mut self, child: SceneNode) -> usize {
        self.children.push(child);
        self.children.len() - 1
    }

    pub fn node(&self, path: &[usize]) -> Option<&SceneNode> {
        path.iter()
            .try_fold(self, |node, &index| node.children.get(index))
    }

    pub fn node_mut(&mut self, path: &[usize]) -> Option<&mut SceneNode> {
        path.iter()
            .try_fold(self, |node, &index| node.children.get_mut(index))
    }

    /// Path to the first node named `name`, depth first.
    pub fn find(&self, name: &str) -> Option<NodePath> {
        if self.name == name {
            return Some(Vec::new());
        }
        self.children.iter().enumerate().find_map(|(index, child)| {
            child.find(name).map(|mut path| {
                path.insert(0, index);
                path
            })
        })
    }

    /// Total number of nodes in this subtree.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(SceneNode::count).sum::<usize>()
    }

    /// World matrix of the node at `path`, or `None` if the path is invalid.
    pub fn world_matrix(&self, path: &[usize]) -> Option<Mat4> {
        let mut node = self;
        let mut world = self.transform.matrix();
        for &index in path {
            node = node.children.get(index)?;
            world *= node.transform.matrix();
        }
        Some(world)
    }

    /// Visit every node depth first with its world matrix.
    pub fn visit_world(&self, visit: &mut impl FnMut(&SceneNode, Mat4)) {
        self.visit_from(Mat4::IDENTITY, visit);
    }

    fn visit_from(&self, parent: Mat4, visit: &mut impl FnMut(&SceneNode, Mat4)) {
        let world = parent * self.transform.matrix();
        visit(self, world);
        for child in &self.children {
            child.visit_from(world, visit);
        }
    }

    /// Visit every node depth first with its path from this node.
    pub fn visit_paths(&self, visit: &mut impl FnMut(&[usize], &SceneNode)) {
        let mut path = Vec::new();
        self.visit_paths_from(&mut path, visit);
    }

    fn visit_paths_from(
        &self,
        path: &mut NodePath,
        visit: &mut impl FnMut(&[usize], &SceneNode),
    ) {
        visit(path, self);
        for (index, child) in self.children.iter().enumerate() {
            path.push(index);
            child.visit_paths_from(path, visit);
            path.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SceneNode {
        let mut root = SceneNode::group("root");
        let mut orbit = SceneNode::group("orbit")
            .with_transform(Transform::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        orbit.add_child(
            SceneNode::group("moon")
                .with_transform(Transform::from_translation(Vec3::new(0.0, 0.0, 2.0))),
        );
        root.add_child(SceneNode::new("ambient", NodeKind::AmbientLight));
        root.add_child(orbit);
        root
    }

    #[test]
    fn test_paths_resolve() {
        let root = sample();
        assert_eq!(root.find("moon"), Some(vec![1, 0]));
        assert_eq!(root.node(&[1, 0]).map(|n| n.name.as_str()), Some("moon"));
        assert!(root.node(&[3]).is_none());
        assert!(root.find("comet").is_none());
        assert_eq!(root.count(), 4);
    }

    #[test]
    fn test_world_matrix_composes_parents() {
        let root = sample();
        let world = root.world_matrix(&[1, 0]).unwrap();
        let origin = world.transform_point3(Vec3::ZERO);
        assert!(origin.abs_diff_eq(Vec3::new(10.0, 0.0, 2.0), 1e-6));
    }

    #[test]
    fn test_node_mut_moves_subtree() {
        let mut root = sample();
        root.node_mut(&[1]).unwrap().transform.translation = Vec3::new(-4.0, 0.0, 0.0);

        let mut moon_world = None;
        root.visit_world(&mut |node, world| {
            if node.name == "moon" {
                moon_world = Some(world.transform_point3(Vec3::ZERO));
            }
        });
        assert!(moon_world.unwrap().abs_diff_eq(Vec3::new(-4.0, 0.0, 2.0), 1e-6));
    }

    #[test]
    fn test_visit_paths_resolve_back() {
        let root = sample();
        let mut visited = Vec::new();
        root.visit_paths(&mut |path, node| visited.push((path.to_vec(), node.name.clone())));
        assert_eq!(visited.len(), root.count());
        for (path, name) in &visited {
            assert_eq!(&root.node(path).unwrap().name, name);
        }
        assert_eq!(visited[0].0, Vec::<usize>::new());
    }

    #[test]
    fn test_rotation_then_translation() {
        let transform = Transform {
            translation: Vec3::new(1.0, 0.0, 0.0),
            rotation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            scale: Vec3::splat(2.0),
        };
        let p = transform.matrix().transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::new(1.0, 0.0, -2.0), 1e-5));
    }
}
