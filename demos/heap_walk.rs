use std::io::Read;

use dynalloc::{Dynalloc, HEADER_SIZE, ProgramBreak, print_heap};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap` or
/// `gdb`, or just watch the program break move between steps.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn print_step(
  label: &str,
  allocator: &Dynalloc<ProgramBreak>,
) {
  println!("\n[{}] PID = {}", label, std::process::id());
  print_heap(allocator);
}

fn main() {
  // RUST_LOG=trace shows every merge, split and boundary move.
  env_logger::init();

  // The demo drives the real program break. The system allocator shares
  // it, so keep other heap traffic between steps to a minimum.
  let mut allocator = Dynalloc::new(ProgramBreak::new());
  println!("header overhead = {} bytes", HEADER_SIZE);
  print_step("start", &allocator);
  block_until_enter_pressed();

  unsafe {
    // --------------------------------------------------------------------
    // 1) Two allocations: 40 bytes, and 10 bytes which is raised to the
    //    minimum block size.
    // --------------------------------------------------------------------
    let p1 = allocator.allocate(40);
    let p2 = allocator.allocate(10);
    p1.write_bytes(0xAB, 40);
    print_step("1: allocate(40), allocate(10)", &allocator);
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) Free the first block. It is not the tail, so it only gets marked
    //    free and the program break stays where it is.
    // --------------------------------------------------------------------
    allocator.deallocate(p1);
    print_step("2: deallocate(p1)", &allocator);
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) Free the tail. The trailing free run covers both blocks, so the
    //    program break retreats to where it started.
    // --------------------------------------------------------------------
    allocator.deallocate(p2);
    print_step("3: deallocate(p2)", &allocator);
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) Build a hole in the middle and reuse it with a smaller request.
    // --------------------------------------------------------------------
    let a = allocator.allocate(256);
    let b = allocator.allocate(64);
    allocator.deallocate(a);
    let c = allocator.allocate(64);
    print_step("4: reuse of a freed 256 byte block", &allocator);
    println!("    c == a? {}", c == a);
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 5) Grow `c` into the free remainder behind it.
    // --------------------------------------------------------------------
    let c = allocator.reallocate(c, 160);
    print_step("5: reallocate(c, 160)", &allocator);
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 6) Grow the tail, which moves the program break.
    // --------------------------------------------------------------------
    let b = allocator.reallocate(b, 64 * 1024);
    print_step("6: reallocate(b, 64 KiB)", &allocator);
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 7) A validated free of a pointer we never handed out is ignored.
    // --------------------------------------------------------------------
    let mut local = [0u8; 64];
    allocator.deallocate_validated(local.as_mut_ptr().add(HEADER_SIZE));
    print_step("7: deallocate_validated(foreign)", &allocator);

    allocator.deallocate(c);
    allocator.deallocate(b);
    print_step("8: everything freed", &allocator);
    println!("\n{:?}", allocator.stats());
  }
}
