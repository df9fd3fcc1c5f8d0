//! # Stage
//!
//! The stage is the retained node tree every widget lives in. It is a cheap,
//! cloneable handle (`Rc<RefCell<..>>`) over a slotmap arena, so widgets keep
//! a `Stage` plus the `NodeId`s they own and mutate them through short
//! borrows.
//!
//! Conventions:
//!
//! - A node's `position` is the *center* of its box, relative to its parent.
//!   Its `graphics` are drawn around its local origin.
//! - A node's `clip` is in node-local coordinates and applies to its children
//!   only.
//! - Nodes spawned with [`Stage::spawn`] join the top-level display list.
//!   Detached nodes stay alive but are neither drawn nor hit-tested until
//!   they are parented again.
//!
//! Destroy hooks ([`Stage::on_destroy`]) fire after the subtree is gone and
//! the stage borrow is released, so hooks may freely call back into the stage.

use std::cell::RefCell;
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::measure::{Measurable, resolve_size};
use crate::{Error, Rect, Result, Scene, SceneNode, Size, Vec2};

new_key_type! {
    pub struct NodeId;
    pub struct HookId;
}

/// Objects under a point, top-most first.
pub type HitList = SmallVec<[NodeId; 8]>;

#[derive(Clone, Debug)]
pub struct Node {
    pub position: Vec2,
    pub visible: bool,
    /// Participates in `hit_test`.
    pub interactive: bool,
    /// Rendered size, when the node draws at a fixed box.
    pub display_size: Option<Size>,
    /// Unscaled content size (text extents, laid-out container extents).
    pub size: Option<Size>,
    pub clip: Option<Rect>,
    pub graphics: Vec<SceneNode>,
    /// Debug name, shown by inspectors.
    pub name: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            visible: true,
            interactive: false,
            display_size: None,
            size: None,
            clip: None,
            graphics: Vec::new(),
            name: None,
            parent: None,
            children: Vec::new(),
        }
    }
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.position = Vec2::new(x, y);
        self
    }
    pub fn display_size(mut self, w: f32, h: f32) -> Self {
        self.display_size = Some(Size::new(w, h));
        self
    }
    pub fn size(mut self, w: f32, h: f32) -> Self {
        self.size = Some(Size::new(w, h));
        self
    }
    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
    pub fn graphics(mut self, g: Vec<SceneNode>) -> Self {
        self.graphics = g;
        self
    }
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

struct Hook {
    node: NodeId,
    f: Rc<dyn Fn(NodeId)>,
}

#[derive(Default)]
struct StageInner {
    nodes: SlotMap<NodeId, Node>,
    roots: Vec<NodeId>,
    hooks: SlotMap<HookId, Hook>,
}

struct NodeRef<'a> {
    stage: &'a StageInner,
    id: NodeId,
}

impl Measurable for NodeRef<'_> {
    fn display_size(&self) -> Option<Size> {
        self.stage.nodes.get(self.id).and_then(|n| n.display_size)
    }
    fn intrinsic_size(&self) -> Option<Size> {
        self.stage.nodes.get(self.id).and_then(|n| n.size)
    }
    fn bounds(&self) -> Option<Rect> {
        self.stage.local_bounds(self.id)
    }
}

impl StageInner {
    fn measure(&self, id: NodeId) -> Size {
        if !self.nodes.contains_key(id) {
            return Size::ZERO;
        }
        resolve_size(&NodeRef { stage: self, id })
    }

    /// Union of children boxes and own graphics, relative to the node's
    /// position.
    fn local_bounds(&self, id: NodeId) -> Option<Rect> {
        let node = self.nodes.get(id)?;
        let mut acc: Option<Rect> = None;
        let mut grow = |r: Rect| {
            acc = Some(match acc {
                Some(a) => a.union(&r),
                None => r,
            });
        };
        for &c in &node.children {
            let Some(child) = self.nodes.get(c) else {
                continue;
            };
            if !child.position.is_finite() {
                continue;
            }
            grow(Rect::from_center(child.position, self.measure(c)));
        }
        for g in &node.graphics {
            if let Some(r) = g.extent() {
                grow(r);
            }
        }
        acc
    }

    fn world_position(&self, id: NodeId) -> Option<Vec2> {
        let node = self.nodes.get(id)?;
        let mut p = node.position;
        let mut cur = node.parent;
        while let Some(pid) = cur {
            let n = self.nodes.get(pid)?;
            p = p + n.position;
            cur = n.parent;
        }
        Some(p)
    }

    fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut cur = self.nodes.get(id).and_then(|n| n.parent);
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.nodes.get(p).and_then(|n| n.parent);
        }
        false
    }

    fn unlink(&mut self, id: NodeId) {
        let parent = match self.nodes.get_mut(id) {
            Some(n) => n.parent.take(),
            None => return,
        };
        match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(p) => p.children.retain(|&c| c != id),
            None => self.roots.retain(|&r| r != id),
        }
    }

    fn collect_subtree(&self, id: NodeId, out: &mut Vec<NodeId>) {
        if let Some(n) = self.nodes.get(id) {
            out.push(id);
            for &c in &n.children {
                self.collect_subtree(c, out);
            }
        }
    }

    fn collect_hits(&self, id: NodeId, origin: Vec2, clip: Option<Rect>, p: Vec2, out: &mut HitList) {
        let Some(n) = self.nodes.get(id) else {
            return;
        };
        if !n.visible {
            return;
        }
        let pos = origin + n.position;
        if n.interactive
            && clip.is_none_or(|c| c.contains(p))
            && Rect::from_center(pos, self.measure(id)).contains(p)
        {
            out.push(id);
        }
        let child_clip = match n.clip {
            Some(c) => {
                let wc = c.translate(pos);
                Some(clip.map_or(wc, |outer| outer.intersect(&wc)))
            }
            None => clip,
        };
        for &c in &n.children {
            self.collect_hits(c, pos, child_clip, p, out);
        }
    }

    fn paint(&self, id: NodeId, origin: Vec2, scene: &mut Scene) {
        let Some(n) = self.nodes.get(id) else {
            return;
        };
        if !n.visible {
            return;
        }
        let pos = origin + n.position;
        scene.nodes.extend(n.graphics.iter().map(|g| g.translated(pos)));
        if let Some(c) = n.clip {
            scene.nodes.push(SceneNode::PushClip {
                rect: c.translate(pos),
                radius: 0.0,
            });
        }
        for &c in &n.children {
            self.paint(c, pos, scene);
        }
        if n.clip.is_some() {
            scene.nodes.push(SceneNode::PopClip);
        }
    }
}

#[derive(Clone, Default)]
pub struct Stage(Rc<RefCell<StageInner>>);

impl Stage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether both handles point at the same stage.
    pub fn ptr_eq(&self, other: &Stage) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Adds a node to the top-level display list.
    pub fn spawn(&self, node: Node) -> NodeId {
        let mut st = self.0.borrow_mut();
        let id = st.nodes.insert(Node {
            parent: None,
            children: Vec::new(),
            ..node
        });
        st.roots.push(id);
        id
    }

    pub fn spawn_child(&self, parent: NodeId, node: Node) -> Result<NodeId> {
        let mut st = self.0.borrow_mut();
        if !st.nodes.contains_key(parent) {
            return Err(Error::NodeNotFound(parent));
        }
        let id = st.nodes.insert(Node {
            parent: Some(parent),
            children: Vec::new(),
            ..node
        });
        if let Some(p) = st.nodes.get_mut(parent) {
            p.children.push(id);
        }
        Ok(id)
    }

    /// Like [`Stage::spawn_child`], but a dead `parent` leaves the node at the
    /// top level instead of failing.
    pub fn spawn_in(&self, parent: NodeId, node: Node) -> NodeId {
        let mut st = self.0.borrow_mut();
        let alive = st.nodes.contains_key(parent);
        let id = st.nodes.insert(Node {
            parent: alive.then_some(parent),
            children: Vec::new(),
            ..node
        });
        if alive {
            if let Some(p) = st.nodes.get_mut(parent) {
                p.children.push(id);
            }
        } else {
            st.roots.push(id);
        }
        id
    }

    /// Moves `child` (with its subtree) to the end of `parent`'s children.
    pub fn add_child(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let mut st = self.0.borrow_mut();
        for id in [parent, child] {
            if !st.nodes.contains_key(id) {
                return Err(Error::NodeNotFound(id));
            }
        }
        if parent == child || st.is_descendant_of(parent, child) {
            return Err(Error::CyclicParent { parent, child });
        }
        st.unlink(child);
        if let Some(c) = st.nodes.get_mut(child) {
            c.parent = Some(parent);
        }
        if let Some(p) = st.nodes.get_mut(parent) {
            p.children.push(child);
        }
        Ok(())
    }

    /// Moves a node back to the top-level display list.
    pub fn add_to_root(&self, id: NodeId) -> bool {
        let mut st = self.0.borrow_mut();
        if !st.nodes.contains_key(id) {
            return false;
        }
        st.unlink(id);
        st.roots.push(id);
        true
    }

    /// Takes a node out of the tree without destroying it.
    pub fn detach(&self, id: NodeId) -> bool {
        let mut st = self.0.borrow_mut();
        if !st.nodes.contains_key(id) {
            return false;
        }
        st.unlink(id);
        true
    }

    /// Destroys `id` and its subtree, then fires their destroy hooks.
    pub fn destroy(&self, id: NodeId) -> bool {
        let fired: Vec<(NodeId, Rc<dyn Fn(NodeId)>)> = {
            let mut st = self.0.borrow_mut();
            if !st.nodes.contains_key(id) {
                return false;
            }
            let mut doomed = Vec::new();
            st.collect_subtree(id, &mut doomed);
            st.unlink(id);
            for n in &doomed {
                st.nodes.remove(*n);
            }
            let hook_ids: Vec<HookId> = st
                .hooks
                .iter()
                .filter(|(_, h)| doomed.contains(&h.node))
                .map(|(k, _)| k)
                .collect();
            hook_ids
                .into_iter()
                .filter_map(|k| st.hooks.remove(k))
                .map(|h| (h.node, h.f))
                .collect()
        };
        log::trace!("stage: destroyed {id:?} ({} hooks)", fired.len());
        for (node, f) in fired {
            f(node);
        }
        true
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.0.borrow().nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.borrow().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().nodes.is_empty()
    }

    pub fn with_node<R>(&self, id: NodeId, f: impl FnOnce(&Node) -> R) -> Option<R> {
        self.0.borrow().nodes.get(id).map(f)
    }

    pub fn update<R>(&self, id: NodeId, f: impl FnOnce(&mut Node) -> R) -> Option<R> {
        self.0.borrow_mut().nodes.get_mut(id).map(f)
    }

    pub fn position(&self, id: NodeId) -> Option<Vec2> {
        self.with_node(id, |n| n.position)
    }

    pub fn set_position(&self, id: NodeId, x: f32, y: f32) -> bool {
        self.update(id, |n| n.position = Vec2::new(x, y)).is_some()
    }

    pub fn set_graphics(&self, id: NodeId, graphics: Vec<SceneNode>) -> bool {
        self.update(id, |n| n.graphics = graphics).is_some()
    }

    pub fn set_clip(&self, id: NodeId, clip: Option<Rect>) -> bool {
        self.update(id, |n| n.clip = clip).is_some()
    }

    pub fn set_visible(&self, id: NodeId, visible: bool) -> bool {
        self.update(id, |n| n.visible = visible).is_some()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.with_node(id, |n| n.parent).flatten()
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.with_node(id, |n| n.children.clone()).unwrap_or_default()
    }

    pub fn roots(&self) -> Vec<NodeId> {
        self.0.borrow().roots.clone()
    }

    pub fn world_position(&self, id: NodeId) -> Option<Vec2> {
        self.0.borrow().world_position(id)
    }

    /// Resolved size: display size, then intrinsic size, then bounds.
    pub fn measure(&self, id: NodeId) -> Size {
        self.0.borrow().measure(id)
    }

    /// Bounding box relative to the node's position.
    pub fn bounds(&self, id: NodeId) -> Option<Rect> {
        self.0.borrow().local_bounds(id)
    }

    /// Walks the parent chain of `id` looking for `ancestor`.
    pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        self.0.borrow().is_descendant_of(id, ancestor)
    }

    /// Interactive, visible nodes under `p` (world coordinates), top-most
    /// first. Ancestor clips hide what they cut away.
    pub fn hit_test(&self, p: Vec2) -> HitList {
        let st = self.0.borrow();
        let mut out = HitList::new();
        for &r in &st.roots {
            st.collect_hits(r, Vec2::ZERO, None, p, &mut out);
        }
        out.reverse();
        out
    }

    pub fn render(&self) -> Scene {
        let st = self.0.borrow();
        let mut scene = Scene::default();
        for &r in &st.roots {
            st.paint(r, Vec2::ZERO, &mut scene);
        }
        scene
    }

    /// Runs `f` once `id` is destroyed (directly or with an ancestor).
    pub fn on_destroy(&self, id: NodeId, f: impl Fn(NodeId) + 'static) -> Option<HookId> {
        let mut st = self.0.borrow_mut();
        if !st.nodes.contains_key(id) {
            return None;
        }
        Some(st.hooks.insert(Hook {
            node: id,
            f: Rc::new(f),
        }))
    }

    pub fn off_destroy(&self, hook: HookId) -> bool {
        self.0.borrow_mut().hooks.remove(hook).is_some()
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.0.borrow();
        f.debug_struct("Stage")
            .field("nodes", &st.nodes.len())
            .field("roots", &st.roots.len())
            .field("hooks", &st.hooks.len())
            .finish()
    }
}
