use std::env;

use eyre::Result;
use nm_sweep::main_inner;

fn main() -> Result<()> {
    main_inner(env::args())
}
