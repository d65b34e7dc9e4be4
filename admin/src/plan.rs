//! Instruction plans

use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    CreateAccount { space: usize },
    InitMapping,
    AddProduct,
    UpdateProduct,
    AddPrice { exponent: i32 },
    AddPublisher { publisher: Pubkey },
    RemovePublisher { publisher: Pubkey },
    SetMinPublishers { min_publishers: u8 },
    UpdatePermissions,
    DeletePrice,
    DeleteProduct,
    ResizePriceAccount,
}

/// One planned mutation and the instruction that performs it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    /// Account the operation creates or changes
    pub target: Pubkey,
    pub instruction: Instruction,
}

impl Operation {
    pub fn new(kind: OperationKind, target: Pubkey, instruction: Instruction) -> Self {
        Self {
            kind,
            target,
            instruction,
        }
    }

    pub fn signers(&self) -> impl Iterator<Item = &Pubkey> + '_ {
        self.instruction
            .accounts
            .iter()
            .filter(|meta| meta.is_signer)
            .map(|meta| &meta.pubkey)
    }
}

pub fn instructions(operations: &[Operation]) -> Vec<Instruction> {
    operations.iter().map(|op| op.instruction.clone()).collect()
}

/// Operations for one symbol, independent of every other symbol's
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolPlan {
    pub symbol: String,
    pub operations: Vec<Operation>,
}

impl SymbolPlan {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            operations: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn instructions(&self) -> Vec<Instruction> {
        instructions(&self.operations)
    }
}

/// All four phases, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstructionPlan {
    pub authority: Vec<Operation>,
    pub mapping: Vec<Operation>,
    pub products: Vec<SymbolPlan>,
    pub publishers: Vec<SymbolPlan>,
}

impl InstructionPlan {
    pub fn operations(&self) -> impl Iterator<Item = &Operation> + '_ {
        self.authority
            .iter()
            .chain(self.mapping.iter())
            .chain(self.products.iter().flat_map(|plan| plan.operations.iter()))
            .chain(self.publishers.iter().flat_map(|plan| plan.operations.iter()))
    }

    pub fn len(&self) -> usize {
        self.operations().count()
    }

    pub fn is_empty(&self) -> bool {
        self.operations().next().is_none()
    }

    /// Count operations matching `predicate`
    pub fn count(&self, predicate: impl Fn(&OperationKind) -> bool) -> usize {
        self.operations().filter(|op| predicate(&op.kind)).count()
    }

    /// Every key that must sign some instruction of the plan
    pub fn signers(&self) -> BTreeSet<Pubkey> {
        self.operations().flat_map(Operation::signers).copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_layout::instruction;

    #[test]
    fn test_plan_counts_and_signers() {
        let program_id = Pubkey::new_unique();
        let funding = Pubkey::new_unique();
        let mapping = Pubkey::new_unique();
        let price = Pubkey::new_unique();
        let publisher = Pubkey::new_unique();

        let mut publishers = SymbolPlan::new("BTCUSD");
        publishers.operations.push(Operation::new(
            OperationKind::AddPublisher { publisher },
            price,
            instruction::toggle_publisher(&program_id, &funding, &price, &publisher, true),
        ));

        let plan = InstructionPlan {
            mapping: vec![Operation::new(
                OperationKind::InitMapping,
                mapping,
                instruction::init_mapping(&program_id, &funding, &mapping),
            )],
            products: vec![SymbolPlan::new("BTCUSD")],
            publishers: vec![publishers],
            ..InstructionPlan::default()
        };

        assert_eq!(plan.len(), 2);
        assert!(!plan.is_empty());
        assert_eq!(
            plan.count(|kind| matches!(kind, OperationKind::AddPublisher { .. })),
            1
        );
        assert_eq!(
            plan.signers(),
            [funding, mapping, price].into_iter().collect()
        );
        assert!(InstructionPlan::default().is_empty());
    }
}
