//! # Row, Column and Grid
//!
//! Containers own one stage node and position its children around the
//! container's origin. They never lay themselves out on mutation: call
//! `layout()` directly, or hand them a [`LayoutScheduler`] with
//! `schedule_with` and every mutation marks them dirty for the next frame.
//!
//! ```rust
//! use vellum_core::*;
//! use vellum_ui::*;
//!
//! let stage = Stage::new();
//! let col = Column(&stage).gap(10.0);
//! for _ in 0..3 {
//!     let item = stage.spawn(Node::new().display_size(80.0, 20.0));
//!     col.add(item).unwrap();
//! }
//! col.layout();
//!
//! // 3 * 20 + 2 * 10, centered on the column's origin
//! assert_eq!(stage.measure(col.node()), Size::new(80.0, 80.0));
//! let first = col.children()[0];
//! assert_eq!(stage.position(first), Some(Vec2::new(0.0, -30.0)));
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use vellum_core::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// Cross-axis alignment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Align {
    Start,
    #[default]
    Center,
    End,
}

/// Ordered child list shared by every container.
struct Children {
    stage: Stage,
    node: NodeId,
    ids: RefCell<Vec<NodeId>>,
    scheduler: RefCell<Option<LayoutScheduler>>,
}

impl Children {
    fn new(stage: &Stage, name: &str) -> Self {
        let node = stage.spawn(Node::new().named(name));
        Self {
            stage: stage.clone(),
            node,
            ids: RefCell::new(Vec::new()),
            scheduler: RefCell::new(None),
        }
    }

    fn add(&self, child: NodeId) -> Result<()> {
        self.stage.add_child(self.node, child)?;
        let mut ids = self.ids.borrow_mut();
        ids.retain(|&c| c != child);
        ids.push(child);
        Ok(())
    }

    fn remove(&self, child: NodeId, destroy: bool) -> bool {
        let found = {
            let mut ids = self.ids.borrow_mut();
            let before = ids.len();
            ids.retain(|&c| c != child);
            ids.len() != before
        };
        if found {
            if destroy {
                self.stage.destroy(child);
            } else {
                self.stage.detach(child);
            }
        }
        found
    }

    fn clear(&self, destroy: bool) {
        let ids = std::mem::take(&mut *self.ids.borrow_mut());
        for c in ids {
            if destroy {
                self.stage.destroy(c);
            } else {
                self.stage.detach(c);
            }
        }
    }

    /// Live children with their measured sizes. Stale ids are dropped.
    fn measured(&self) -> Vec<(NodeId, Size)> {
        let mut ids = self.ids.borrow_mut();
        ids.retain(|&c| self.stage.contains(c));
        ids.iter().map(|&c| (c, self.stage.measure(c))).collect()
    }

    fn set_extent(&self, size: Size) {
        self.stage.update(self.node, |n| n.size = Some(size));
    }
}

macro_rules! container_common {
    ($ty:ident) => {
        impl $ty {
            /// The container's own node.
            pub fn node(&self) -> NodeId {
                self.inner.children.node
            }

            pub fn children(&self) -> Vec<NodeId> {
                self.inner.children.ids.borrow().clone()
            }

            pub fn len(&self) -> usize {
                self.inner.children.ids.borrow().len()
            }

            pub fn is_empty(&self) -> bool {
                self.inner.children.ids.borrow().is_empty()
            }

            /// Appends `child`, reparenting it under the container.
            pub fn add(&self, child: NodeId) -> Result<&Self> {
                self.inner.children.add(child)?;
                self.invalidate();
                Ok(self)
            }

            pub fn add_many(&self, children: impl IntoIterator<Item = NodeId>) -> Result<&Self> {
                for c in children {
                    self.inner.children.add(c)?;
                }
                self.invalidate();
                Ok(self)
            }

            /// Removes `child`; `destroy` also tears it down, otherwise it is
            /// only detached.
            pub fn remove(&self, child: NodeId, destroy: bool) -> &Self {
                if self.inner.children.remove(child, destroy) {
                    self.invalidate();
                }
                self
            }

            pub fn clear(&self, destroy: bool) -> &Self {
                self.inner.children.clear(destroy);
                self.invalidate();
                self
            }

            pub fn set_position(&self, x: f32, y: f32) -> &Self {
                self.inner.children.stage.set_position(self.node(), x, y);
                self
            }

            /// Mutations mark this container dirty on `scheduler` from now on.
            pub fn schedule_with(&self, scheduler: &LayoutScheduler) -> &Self {
                *self.inner.children.scheduler.borrow_mut() = Some(scheduler.clone());
                self.invalidate();
                self
            }

            fn invalidate(&self) {
                let scheduler = self.inner.children.scheduler.borrow().clone();
                if let Some(s) = scheduler {
                    s.mark_dirty(self);
                }
            }
        }

        impl LayoutTarget for $ty {
            fn layout(&self) {
                $ty::layout(self);
            }
            fn layout_id(&self) -> LayoutId {
                LayoutId::of(&self.inner)
            }
        }
    };
}

struct LinearInner {
    children: Children,
    axis: Axis,
    gap: Cell<f32>,
    align: Cell<Align>,
}

/// Children stacked along one axis, the whole run centered on the origin.
#[derive(Clone)]
pub struct LinearLayout {
    inner: Rc<LinearInner>,
}

pub fn Row(stage: &Stage) -> LinearLayout {
    LinearLayout::new(stage, Axis::Horizontal)
}

pub fn Column(stage: &Stage) -> LinearLayout {
    LinearLayout::new(stage, Axis::Vertical)
}

impl LinearLayout {
    pub fn new(stage: &Stage, axis: Axis) -> Self {
        let name = match axis {
            Axis::Horizontal => "row",
            Axis::Vertical => "column",
        };
        Self {
            inner: Rc::new(LinearInner {
                children: Children::new(stage, name),
                axis,
                gap: Cell::new(0.0),
                align: Cell::new(Align::Center),
            }),
        }
    }

    pub fn axis(&self) -> Axis {
        self.inner.axis
    }

    pub fn gap(self, gap: f32) -> Self {
        self.set_gap(gap);
        self
    }

    pub fn align(self, align: Align) -> Self {
        self.set_align(align);
        self
    }

    pub fn set_gap(&self, gap: f32) -> &Self {
        self.inner.gap.set(gap.max(0.0));
        self.invalidate();
        self
    }

    pub fn set_align(&self, align: Align) -> &Self {
        self.inner.align.set(align);
        self.invalidate();
        self
    }

    pub fn layout(&self) {
        let inner = &self.inner;
        let items = inner.children.measured();
        let gap = inner.gap.get();
        let horizontal = inner.axis == Axis::Horizontal;
        let main = |s: Size| if horizontal { s.width } else { s.height };
        let cross = |s: Size| if horizontal { s.height } else { s.width };

        let total: f32 = items.iter().map(|(_, s)| main(*s)).sum::<f32>()
            + gap * items.len().saturating_sub(1) as f32;
        let cross_max = items.iter().map(|(_, s)| cross(*s)).fold(0.0_f32, f32::max);

        let mut cursor = -total * 0.5;
        for (id, size) in &items {
            let (m, c) = (main(*size), cross(*size));
            let along = cursor + m * 0.5;
            let across = match inner.align.get() {
                Align::Start => (c - cross_max) * 0.5,
                Align::Center => 0.0,
                Align::End => (cross_max - c) * 0.5,
            };
            let (x, y) = if horizontal { (along, across) } else { (across, along) };
            inner.children.stage.set_position(*id, x, y);
            cursor += m + gap;
        }

        let extent = if horizontal {
            Size::new(total, cross_max)
        } else {
            Size::new(cross_max, total)
        };
        inner.children.set_extent(extent);
        log::trace!("{:?} layout: {} children, extent {:?}", inner.axis, items.len(), extent);
    }
}

container_common!(LinearLayout);

struct GridInner {
    children: Children,
    columns: Cell<usize>,
    row_gap: Cell<f32>,
    column_gap: Cell<f32>,
    cell: Cell<Option<Size>>,
}

/// Fixed column count; every cell is as large as the largest child unless a
/// cell size is set. Children are centered in their cells.
#[derive(Clone)]
pub struct GridLayout {
    inner: Rc<GridInner>,
}

pub fn Grid(stage: &Stage, columns: usize) -> GridLayout {
    GridLayout::new(stage, columns)
}

impl GridLayout {
    pub fn new(stage: &Stage, columns: usize) -> Self {
        Self {
            inner: Rc::new(GridInner {
                children: Children::new(stage, "grid"),
                columns: Cell::new(columns.max(1)),
                row_gap: Cell::new(0.0),
                column_gap: Cell::new(0.0),
                cell: Cell::new(None),
            }),
        }
    }

    pub fn gaps(self, row_gap: f32, column_gap: f32) -> Self {
        self.set_gaps(row_gap, column_gap);
        self
    }

    pub fn columns(&self) -> usize {
        self.inner.columns.get()
    }

    pub fn set_columns(&self, columns: usize) -> &Self {
        self.inner.columns.set(columns.max(1));
        self.invalidate();
        self
    }

    pub fn set_gaps(&self, row_gap: f32, column_gap: f32) -> &Self {
        self.inner.row_gap.set(row_gap.max(0.0));
        self.inner.column_gap.set(column_gap.max(0.0));
        self.invalidate();
        self
    }

    /// `None` sizes cells to the largest child.
    pub fn set_cell_size(&self, cell: Option<Size>) -> &Self {
        self.inner.cell.set(cell);
        self.invalidate();
        self
    }

    pub fn layout(&self) {
        let inner = &self.inner;
        let items = inner.children.measured();
        if items.is_empty() {
            inner.children.set_extent(Size::ZERO);
            return;
        }
        let cols = inner.columns.get();
        let rows = items.len().div_ceil(cols);
        let (rg, cg) = (inner.row_gap.get(), inner.column_gap.get());
        let cell = inner.cell.get().unwrap_or_else(|| {
            items.iter().fold(Size::ZERO, |acc, (_, s)| {
                Size::new(acc.width.max(s.width), acc.height.max(s.height))
            })
        });

        let w = cols as f32 * cell.width + cg * (cols - 1) as f32;
        let h = rows as f32 * cell.height + rg * (rows - 1) as f32;
        for (i, (id, _)) in items.iter().enumerate() {
            let (c, r) = (i % cols, i / cols);
            let x = -w * 0.5 + c as f32 * (cell.width + cg) + cell.width * 0.5;
            let y = -h * 0.5 + r as f32 * (cell.height + rg) + cell.height * 0.5;
            inner.children.stage.set_position(*id, x, y);
        }
        inner.children.set_extent(Size::new(w, h));
    }
}

container_common!(GridLayout);
