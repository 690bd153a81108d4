//! Example: Recursive component composition
//!
//! Demonstrates: a grid loading its pager and toolbar as independently
//! validated sub-components scoped under the grid's bound node
//!
//! Run with: `cargo run --example grid_pager`

use std::sync::{Arc, Mutex};

use armar::prelude::*;

struct Pager {
    core: Arc<ComponentCore>,
}

impl Pager {
    fn page_count(&self) -> ArmarResult<usize> {
        Ok(self.core.find_all(&Locator::css("button"))?.len())
    }
}

impl Loadable for Pager {
    fn load(&self, _assembler: &Assembler) -> ArmarResult<()> {
        self.core.bind()
    }

    fn load_state(&self) -> LoadState {
        self.core.state()
    }
}

struct Toolbar {
    core: Arc<ComponentCore>,
}

impl Loadable for Toolbar {
    fn load(&self, _assembler: &Assembler) -> ArmarResult<()> {
        self.core.bind()
    }

    fn load_state(&self) -> LoadState {
        self.core.state()
    }
}

struct Grid {
    core: Arc<ComponentCore>,
    pager: Mutex<Option<Arc<Pager>>>,
    toolbar: Mutex<Option<Arc<Toolbar>>>,
}

impl Loadable for Grid {
    fn load(&self, assembler: &Assembler) -> ArmarResult<()> {
        self.core.bind_with(|_node| {
            let pager = assembler
                .prepare_component::<Pager>(Locator::css(".pager"), Some(Arc::clone(&self.core)))?;
            let toolbar = assembler.prepare_component::<Toolbar>(
                Locator::css(".toolbar"),
                Some(Arc::clone(&self.core)),
            )?;
            *self.pager.lock().unwrap() = Some(pager);
            *self.toolbar.lock().unwrap() = Some(toolbar);
            Ok(())
        })
    }

    fn load_state(&self) -> LoadState {
        self.core.state()
    }
}

fn component_module() -> Module {
    Module::builder("components", 0)
        .transient::<Grid, _>(|r| {
            Ok(Arc::new(Grid {
                core: Arc::new(r.component_core()?.expect_tag("table").expect_marker_class("grid")),
                pager: Mutex::new(None),
                toolbar: Mutex::new(None),
            }))
        })
        .transient::<Pager, _>(|r| {
            Ok(Arc::new(Pager {
                core: Arc::new(r.component_core()?.expect_tag("nav")),
            }))
        })
        .transient::<Toolbar, _>(|r| {
            Ok(Arc::new(Toolbar {
                core: Arc::new(r.component_core()?.expect_tag("div")),
            }))
        })
        .build()
}

fn main() -> ArmarResult<()> {
    println!("=== Grid / Pager Composition Example ===\n");

    // 1. A document with a grid that owns a pager and a toolbar
    println!("1. Installing the document...");
    let driver = Arc::new(MockDriver::new());
    driver.install_document(
        MockNode::new("main")
            .with_child(MockNode::new("nav").with_class("pager").with_text("decoy"))
            .with_child(
                MockNode::new("table")
                    .with_class("grid")
                    .with_child(
                        MockNode::new("nav")
                            .with_class("pager")
                            .with_child(MockNode::new("button").with_text("1"))
                            .with_child(MockNode::new("button").with_text("2"))
                            .with_child(MockNode::new("button").with_text("3")),
                    )
                    .with_child(MockNode::new("div").with_class("toolbar")),
            ),
    );

    let assembler = Assembler::new(
        driver.clone(),
        AssemblerOptions::hermetic().with_module(component_module()),
    )?;

    // 2. Preparing the grid recursively prepares its children
    println!("2. Preparing the grid...");
    let grid = assembler.prepare_component::<Grid>(Locator::css("table.grid"), None)?;
    println!("   Grid state: {}", grid.load_state());

    let pager = grid.pager.lock().unwrap().clone().expect("pager assembled");
    println!("   Pager state: {}", pager.load_state());
    println!("   Pager buttons: {}", pager.page_count()?);

    let toolbar = grid.toolbar.lock().unwrap().clone().expect("toolbar assembled");
    println!("   Toolbar state: {}", toolbar.load_state());

    // 3. Structural failure: a grid without a pager
    println!("\n3. Preparing against a document with no pager...");
    driver.install_document(
        MockNode::new("main").with_child(
            MockNode::new("table")
                .with_class("grid")
                .with_child(MockNode::new("div").with_class("toolbar")),
        ),
    );

    match assembler.prepare_component::<Grid>(Locator::css("table.grid"), None) {
        Ok(_) => println!("   unexpected success"),
        Err(err) => println!("   failed as expected: {err}"),
    }

    println!("\n✅ Grid composition example completed!");
    Ok(())
}
