use token_automata::{
    program::{Inst, Program, FAILURE, SUCCESS},
    vm::{Machine, ThreadState},
};

use crate::Result;

fn machine(insts: Vec<Inst<char>>) -> Result<Machine<char, char>> {
    Ok(Machine::new(Program::new(insts)?)?)
}

#[test]
fn empty_program() -> Result<()> {
    let m = machine(vec![])?;
    assert!(m.is_finished());
    Ok(())
}

#[test]
fn pass() -> Result<()> {
    let m = machine(vec![Inst::Pass])?;
    assert!(m.is_finished());
    assert_eq!(SUCCESS, m.terminations()[0].register());
    Ok(())
}

#[test]
fn match_sets_register() -> Result<()> {
    let m = machine(vec![Inst::Match(true)])?;
    assert!(m.is_finished());
    assert_eq!(SUCCESS, m.terminations()[0].register());

    let m = machine(vec![Inst::Match(false)])?;
    assert!(m.is_finished());
    assert_eq!(FAILURE, m.terminations()[0].register());
    assert!(!m.has_matched());
    Ok(())
}

#[test]
fn jump_skips_instructions() -> Result<()> {
    let m = machine(vec![
        Inst::Pass,
        Inst::Jump(3),
        Inst::Match(false),
        Inst::Pass,
        Inst::Input('z'),
    ])?;
    assert_eq!(1, m.threads().len());
    assert_eq!(3, m.threads()[0].steps());
    Ok(())
}

#[test]
fn jump_out_of_range() {
    let insts = vec![Inst::<char>::Jump(3), Inst::Pass];
    assert!(Program::new(insts.clone()).is_err());

    let program = Program::new_unchecked(insts);
    let result: std::result::Result<Machine<char, char>, _> =
        Machine::new(program);
    assert!(result.is_err());
}

#[test]
fn fork_counts_steps_per_path() -> Result<()> {
    let m = machine(vec![
        Inst::Fork(vec![3, 6]), // 0
        Inst::Pass,             // 1
        Inst::Jump(10),         // 2
        Inst::Pass,             // 3
        Inst::Pass,             // 4
        Inst::Jump(10),         // 5
        Inst::Pass,             // 6
        Inst::Pass,             // 7
        Inst::Pass,             // 8
        Inst::Jump(10),         // 9
        Inst::Input('z'),       // 10
    ])?;
    let steps: Vec<u64> = m.threads().iter().map(|t| t.steps()).collect();
    assert_eq!(vec![3, 4, 5], steps);
    let ids: Vec<u64> = m.threads().iter().map(|t| t.id().as_u64()).collect();
    assert_eq!(vec![0, 1, 2], ids);
    assert!(m
        .threads()
        .iter()
        .all(|t| t.state() == ThreadState::WaitingForInput && t.pc() == 10));
    Ok(())
}

#[test]
fn set_timer_is_relative_to_clock() -> Result<()> {
    let m = machine(vec![Inst::SetTimer(666), Inst::Input('z')])?;
    assert_eq!(Some(666), m.threads()[0].deadline());

    let mut m = machine(vec![
        Inst::Input('a'),
        Inst::SetTimer(10),
        Inst::Input('z'),
    ])?;
    m.set_clock(50);
    m.submit_input('a')?;
    assert_eq!(Some(60), m.threads()[0].deadline());
    Ok(())
}

#[test]
fn stack_push_and_pop() -> Result<()> {
    let m = machine(vec![
        Inst::StackPushValue(1),
        Inst::StackPushValue(2),
        Inst::StackPushValue(3),
        Inst::StackPushValue(4),
        Inst::StackPop(1),
        Inst::StackPop(1),
        Inst::Set(9),
        Inst::StackPush,
        Inst::Input('z'),
    ])?;
    assert_eq!(&[1, 2, 9], m.threads()[0].stack());
    Ok(())
}

#[test]
fn stack_set_and_get() -> Result<()> {
    let m = machine(vec![
        Inst::StackPushValue(1),
        Inst::StackPushValue(2),
        Inst::StackPushValue(3),
        Inst::StackPushValue(4),
        Inst::StackSetValue { pos: 0, value: 11 },
        Inst::StackSetValue { pos: 1, value: 12 },
        Inst::StackGet(2),
        Inst::Input('z'),
    ])?;
    assert_eq!(&[11, 12, 3, 4], m.threads()[0].stack());
    assert_eq!(3, m.threads()[0].register());

    let m = machine(vec![
        Inst::StackPushValue(1),
        Inst::StackPushValue(2),
        Inst::StackGet(-1),
        Inst::Input('z'),
    ])?;
    assert_eq!(2, m.threads()[0].register());
    Ok(())
}

#[test]
fn stack_underflow() {
    let program = Program::new_unchecked(vec![
        Inst::<char>::StackPushValue(1),
        Inst::StackGet(-2),
    ]);
    let result: std::result::Result<Machine<char, char>, _> =
        Machine::new(program);
    assert!(result.is_err());
}

#[test]
fn conditional_branches() -> Result<()> {
    let m = machine(vec![
        Inst::Set(5),
        Inst::Add(-2),
        Inst::Equal { value: 3, addr: 4 },
        Inst::Match(false),
        Inst::Lt { value: 4, addr: 6 },
        Inst::Match(false),
        Inst::Lt { value: 3, addr: 3 },
        Inst::Equal { value: 4, addr: 3 },
        Inst::Set(0),
    ])?;
    assert!(m.is_match());
    assert_eq!(SUCCESS, m.terminations()[0].register());
    Ok(())
}

#[test]
fn running_off_the_end_keeps_register() -> Result<()> {
    let mut m = machine(vec![Inst::Set(7), Inst::Input('a')])?;
    m.submit_input('a')?;
    assert!(m.is_finished());
    assert_eq!(7, m.terminations()[0].register());
    assert!(!m.is_match());

    let mut m = machine(vec![Inst::Input('a')])?;
    m.submit_input('a')?;
    assert!(m.is_match());
    Ok(())
}

#[test]
fn split_parent_takes_first_address() -> Result<()> {
    let m = machine(vec![
        Inst::Split(vec![2, 1]),
        Inst::Input('b'),
        Inst::Input('a'),
    ])?;
    let pcs: Vec<usize> = m.threads().iter().map(|t| t.pc()).collect();
    assert_eq!(vec![2, 1], pcs);
    assert_eq!(vec![&'a', &'b'], m.expected_inputs());
    Ok(())
}

#[test]
fn clones_inherit_state() -> Result<()> {
    let mut m = machine(vec![
        Inst::SetTimer(30),
        Inst::Input('a'),
        Inst::Set(4),
        Inst::StackPush,
        Inst::Fork(vec![6]),
        Inst::Input('b'),
        Inst::Input('c'),
    ])?;
    m.submit_input('a')?;
    assert_eq!(2, m.threads().len());
    let (parent, child) = (&m.threads()[0], &m.threads()[1]);
    assert_eq!(5, parent.pc());
    assert_eq!(6, child.pc());
    assert_eq!(parent.register(), child.register());
    assert_eq!(parent.stack(), child.stack());
    assert_eq!(Some(30), child.deadline());
    Ok(())
}

#[test]
fn mismatch_fails_without_timer() -> Result<()> {
    let mut m = machine(vec![Inst::Input('a'), Inst::Match(true)])?;
    m.submit_input('b')?;
    assert!(m.is_finished());
    assert_eq!(FAILURE, m.terminations()[0].register());
    Ok(())
}

#[test]
fn mismatch_waits_with_timer() -> Result<()> {
    let program = Program::new(vec![
        Inst::SetTimer(10),
        Inst::Input('a'),
        Inst::Match(true),
    ])?;

    let mut m: Machine<char, char> = Machine::new(program.clone())?;
    m.submit_input('x')?;
    m.submit_input('y')?;
    assert!(!m.is_finished());
    assert_eq!(
        vec![&'y'],
        m.threads()[0].pending_input().collect::<Vec<_>>(),
    );
    m.submit_input('a')?;
    assert!(m.is_match());

    let mut m: Machine<char, char> = Machine::builder()
        .configure(Machine::config().timer_blocks_mismatch(false))
        .build(program)?;
    m.submit_input('x')?;
    assert!(m.is_finished());
    assert!(!m.has_matched());
    Ok(())
}

#[test]
fn timer_expiry() -> Result<()> {
    let mut m = machine(vec![
        Inst::SetTimer(10),
        Inst::Input('a'),
        Inst::Match(true),
    ])?;
    m.tick(9)?;
    assert!(!m.is_finished());
    assert!(m.last_terminations().is_empty());

    m.tick(10)?;
    assert!(m.is_finished());
    assert_eq!(1, m.last_terminations().len());
    assert_eq!(FAILURE, m.last_terminations()[0].register());
    Ok(())
}

#[test]
fn timer_precedes_pending_input() -> Result<()> {
    let mut m = machine(vec![
        Inst::SetTimer(10),
        Inst::Input('a'),
        Inst::Match(true),
    ])?;
    m.set_clock(10);
    m.submit_input('a')?;
    assert!(m.is_finished());
    assert!(!m.has_matched());
    Ok(())
}

#[test]
fn terminations_are_recorded_per_turn() -> Result<()> {
    let mut m = machine(vec![
        Inst::Split(vec![1, 3]),
        Inst::Input('a'),
        Inst::Match(true),
        Inst::Input('b'),
        Inst::Input('c'),
        Inst::Match(false),
    ])?;
    assert_eq!(0, m.turn());
    m.submit_input('a')?;
    assert_eq!(1, m.turn());
    let last: Vec<(u64, u64, i64)> = m
        .last_terminations()
        .iter()
        .map(|t| (t.thread().as_u64(), t.turn(), t.register()))
        .collect();
    assert_eq!(vec![(0, 1, SUCCESS), (1, 1, FAILURE)], last);
    assert!(m.is_finished());

    m.run()?;
    assert!(m.last_terminations().is_empty());
    assert_eq!(2, m.terminations().len());
    Ok(())
}
