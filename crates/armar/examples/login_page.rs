//! Example: Assembling a login page
//!
//! Demonstrates: module registration, page preparation, singleton caching
//!
//! Run with: `cargo run --example login_page`

use std::sync::Arc;

use armar::prelude::*;

struct LoginPage {
    core: Arc<PageCore>,
    username: Arc<ComponentCore>,
    password: Arc<ComponentCore>,
    submit: Arc<ComponentCore>,
}

impl LoginPage {
    fn log_in(&self, username: &str, password: &str) -> ArmarResult<()> {
        self.username.type_text(username)?;
        self.password.type_text(password)?;
        self.submit.click()
    }
}

impl Loadable for LoginPage {
    fn load(&self, _assembler: &Assembler) -> ArmarResult<()> {
        self.core.bind_with(|| {
            self.username.bind()?;
            self.password.bind()?;
            self.submit.bind()
        })
    }

    fn load_state(&self) -> LoadState {
        self.core.state()
    }
}

fn main() -> ArmarResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Login Page Assembly Example ===\n");

    // 1. Install a document fixture behind a navigable URL
    println!("1. Installing the login document...");
    let driver = Arc::new(MockDriver::new());
    driver.install_page(
        "https://app.test/login",
        MockNode::new("main").with_child(
            MockNode::new("form")
                .with_child(MockNode::new("input").with_id("username"))
                .with_child(MockNode::new("input").with_id("password"))
                .with_child(MockNode::new("button").with_class("submit")),
        ),
    );

    // 2. Register the page in an ordered module
    println!("2. Registering the page module...");
    let module = Module::builder("pages", 0)
        .singleton::<LoginPage, _>(|r| {
            let driver = r.driver();
            Ok(Arc::new(LoginPage {
                core: Arc::new(
                    r.page_core("https://app.test/login").confirm_path("/login"),
                ),
                username: Arc::new(
                    ComponentCore::new(Arc::clone(&driver), Locator::id("username"))
                        .named("UsernameField")
                        .expect_tag("input"),
                ),
                password: Arc::new(
                    ComponentCore::new(Arc::clone(&driver), Locator::id("password"))
                        .named("PasswordField")
                        .expect_tag("input"),
                ),
                submit: Arc::new(
                    ComponentCore::new(driver, Locator::css("button.submit"))
                        .named("SubmitButton")
                        .expect_tag("button"),
                ),
            }))
        })
        .build();

    let assembler = Assembler::new(
        driver.clone(),
        AssemblerOptions::hermetic().with_module(module),
    )?;
    println!(
        "   Modules applied: {}",
        assembler.registered_modules().len()
    );

    // 3. Prepare: construct, navigate, validate, bind
    println!("\n3. Preparing the page...");
    let page = assembler.prepare_page::<LoginPage>()?;
    println!("   State: {}", page.load_state());

    // 4. Drive it through intention-revealing operations
    println!("\n4. Logging in...");
    page.log_in("admin", "hunter2")?;
    for call in driver.history() {
        println!("   driver <- {call}");
    }

    // 5. Singleton caching: preparing again re-uses the bound instance
    println!("\n5. Preparing the same page again...");
    let again = assembler.prepare_page::<LoginPage>()?;
    println!("   Same instance: {}", Arc::ptr_eq(&page, &again));
    println!(
        "   Navigations recorded: {}",
        driver
            .history()
            .iter()
            .filter(|c| c.starts_with("navigate:"))
            .count()
    );

    println!("\n✅ Login page example completed!");
    Ok(())
}
