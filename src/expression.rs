//! Algebraic expressions over named matrices.
//!
//! An [`Expression`] is a tree whose leaves are matrix names and whose internal nodes
//! are matrix-chain products and sums. Expressions produced by [`ExpressionBuilder`]
//! are shape-checked at construction, so every node carries its shape. Expressions
//! assembled directly from an [`ExpressionNode`] carry no shape until
//! [`Expression::validate`] has been called.
use crate::blocks::{fit_blocks_to_sparsity_pattern, BlockDecomposition, BlockFitOptions};
use crate::error::{KernelError, Result, Shape};
use crate::matrix::MatrixDescriptor;
use crate::registry::MatrixRegistry;
use adergen_sparse::{pattern_product, pattern_union};
use nalgebra::DMatrix;
use nalgebra_sparse::pattern::SparsityPattern;
use rustc_hash::FxHashMap;
use std::fmt;

/// Dense values for named matrices, used for reference evaluation.
pub type MatrixValues = FxHashMap<String, DMatrix<f64>>;

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionNode {
    Matrix(String),
    /// The chain product of the children, from left to right.
    Product(Vec<Expression>),
    Sum(Vec<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    node: ExpressionNode,
    shape: Option<Shape>,
    blocks: Option<BlockDecomposition>,
}

impl From<ExpressionNode> for Expression {
    fn from(node: ExpressionNode) -> Self {
        Self {
            node,
            shape: None,
            blocks: None,
        }
    }
}

impl Expression {
    /// An expression that has not been shape-checked.
    pub fn unvalidated(node: ExpressionNode) -> Self {
        Self::from(node)
    }

    fn validated(node: ExpressionNode, shape: Shape) -> Self {
        Self {
            node,
            shape: Some(shape),
            blocks: None,
        }
    }

    pub fn node(&self) -> &ExpressionNode {
        &self.node
    }

    /// The shape of the expression, if it has been validated.
    pub fn shape(&self) -> Option<Shape> {
        self.shape
    }

    pub fn is_validated(&self) -> bool {
        self.shape.is_some()
    }

    /// The shape of the expression, failing if it has not been validated.
    pub fn validated_shape(&self) -> Result<Shape> {
        self.shape.ok_or_else(|| {
            KernelError::PreconditionViolation(format!("expression `{self}` has not been shape-validated"))
        })
    }

    /// The block decomposition computed by block fitting, if any.
    pub fn blocks(&self) -> Option<&BlockDecomposition> {
        self.blocks.as_ref()
    }

    pub(crate) fn set_blocks(&mut self, blocks: BlockDecomposition) {
        self.blocks = Some(blocks);
    }

    /// Checks the shapes of the whole tree against the registry.
    ///
    /// Leaves must name registered matrices, adjacent factors of a product must agree on
    /// the contraction dimension and all summands must have identical shapes.
    pub fn validate(self, registry: &MatrixRegistry) -> Result<Self> {
        let builder = ExpressionBuilder::new(registry);
        match self.node {
            ExpressionNode::Matrix(name) => builder.matrix(&name),
            ExpressionNode::Product(children) => builder.chain(children),
            ExpressionNode::Sum(children) => builder.sum(children),
        }
    }

    /// Names of all leaves from left to right, including repetitions.
    pub fn matrix_names(&self) -> Vec<&str> {
        match &self.node {
            ExpressionNode::Matrix(name) => vec![name.as_str()],
            ExpressionNode::Product(children) | ExpressionNode::Sum(children) => {
                children.iter().flat_map(Expression::matrix_names).collect()
            }
        }
    }

    /// Expands the expression into a sum of matrix-chain products.
    ///
    /// Products distribute over sums, so `A * (B + C)` yields the terms `[A, B]` and `[A, C]`.
    pub fn terms(&self) -> Vec<Vec<&str>> {
        match &self.node {
            ExpressionNode::Matrix(name) => vec![vec![name.as_str()]],
            ExpressionNode::Sum(children) => children.iter().flat_map(Expression::terms).collect(),
            ExpressionNode::Product(children) => {
                let mut terms = vec![Vec::new()];
                for child in children {
                    let child_terms = child.terms();
                    terms = terms
                        .iter()
                        .flat_map(|prefix| {
                            child_terms.iter().map(move |suffix| {
                                let mut term: Vec<&str> = prefix.clone();
                                term.extend(suffix.iter().copied());
                                term
                            })
                        })
                        .collect();
                }
                terms
            }
        }
    }

    /// The structural sparsity pattern of the result.
    pub fn pattern(&self, registry: &MatrixRegistry) -> Result<SparsityPattern> {
        self.validated_shape()?;
        self.pattern_unchecked(registry)
    }

    fn pattern_unchecked(&self, registry: &MatrixRegistry) -> Result<SparsityPattern> {
        match &self.node {
            ExpressionNode::Matrix(name) => Ok(registry.lookup(name, "expression")?.pattern().into_owned()),
            ExpressionNode::Product(children) => fold_patterns(children, registry, pattern_product),
            ExpressionNode::Sum(children) => fold_patterns(children, registry, pattern_union),
        }
    }

    /// Flattens the expression into a new matrix with the expression's shape and
    /// structural sparsity pattern.
    pub fn flat(&self, name: impl Into<String>, registry: &MatrixRegistry) -> Result<MatrixDescriptor> {
        let pattern = self.pattern(registry)?;
        Ok(MatrixDescriptor::with_pattern(name, pattern))
    }

    /// Decomposes the expression into dense and sparse blocks, storing the result.
    pub fn fit_blocks_to_sparsity_pattern(&mut self, registry: &MatrixRegistry) -> Result<()> {
        fit_blocks_to_sparsity_pattern(self, registry, &BlockFitOptions::default())
    }

    /// Computes the dense value of the expression.
    pub fn evaluate(&self, values: &MatrixValues) -> Result<DMatrix<f64>> {
        let shape = self.validated_shape()?;
        let result = match &self.node {
            ExpressionNode::Matrix(name) => matrix_value(name, values)?.clone(),
            ExpressionNode::Product(children) => {
                let mut factors = children.iter().map(|child| child.evaluate(values));
                let first = factors
                    .next()
                    .ok_or_else(|| KernelError::PreconditionViolation("empty product".to_string()))??;
                factors.try_fold(first, |acc, factor| Ok::<_, KernelError>(acc * factor?))?
            }
            ExpressionNode::Sum(children) => {
                let mut result = DMatrix::zeros(shape.0, shape.1);
                for child in children {
                    result += child.evaluate(values)?;
                }
                result
            }
        };
        if result.shape() != shape {
            return Err(KernelError::ShapeMismatch {
                operation: "evaluate",
                left: self.to_string(),
                left_shape: shape,
                right: "provided values".to_string(),
                right_shape: result.shape(),
            });
        }
        Ok(result)
    }
}

pub(crate) fn matrix_value<'a>(name: &str, values: &'a MatrixValues) -> Result<&'a DMatrix<f64>> {
    values
        .get(name)
        .ok_or_else(|| KernelError::UnresolvedReference {
            name: name.to_string(),
            referenced_by: "evaluation".to_string(),
        })
}

fn fold_patterns(
    children: &[Expression],
    registry: &MatrixRegistry,
    combine: fn(&SparsityPattern, &SparsityPattern) -> SparsityPattern,
) -> Result<SparsityPattern> {
    let mut patterns = children.iter().map(|child| child.pattern_unchecked(registry));
    let first = patterns
        .next()
        .ok_or_else(|| KernelError::PreconditionViolation("empty expression node".to_string()))??;
    patterns.try_fold(first, |acc, pattern| Ok(combine(&acc, &pattern?)))
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            ExpressionNode::Matrix(name) => write!(f, "{name}"),
            ExpressionNode::Product(children) => {
                for (idx, child) in children.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " * ")?;
                    }
                    match child.node {
                        ExpressionNode::Sum(_) => write!(f, "({child})")?,
                        _ => write!(f, "{child}")?,
                    }
                }
                Ok(())
            }
            ExpressionNode::Sum(children) => {
                for (idx, child) in children.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " + ")?;
                    }
                    write!(f, "{child}")?;
                }
                Ok(())
            }
        }
    }
}

/// Something that can be turned into a validated expression: either an expression or
/// the name of a registered matrix.
pub trait Operand {
    fn into_expression(self, registry: &MatrixRegistry) -> Result<Expression>;
}

impl Operand for Expression {
    fn into_expression(self, registry: &MatrixRegistry) -> Result<Expression> {
        if self.is_validated() {
            Ok(self)
        } else {
            self.validate(registry)
        }
    }
}

impl Operand for &Expression {
    fn into_expression(self, registry: &MatrixRegistry) -> Result<Expression> {
        self.clone().into_expression(registry)
    }
}

impl Operand for &str {
    fn into_expression(self, registry: &MatrixRegistry) -> Result<Expression> {
        let descriptor = registry.lookup(self, "expression")?;
        Ok(Expression::validated(ExpressionNode::Matrix(self.to_string()), descriptor.shape()))
    }
}

impl Operand for String {
    fn into_expression(self, registry: &MatrixRegistry) -> Result<Expression> {
        self.as_str().into_expression(registry)
    }
}

impl Operand for &String {
    fn into_expression(self, registry: &MatrixRegistry) -> Result<Expression> {
        self.as_str().into_expression(registry)
    }
}

/// Builds shape-checked expressions over the matrices of a registry.
///
/// ```ignore
/// let builder = ExpressionBuilder::new(&registry);
/// let volume = builder.sum([
///     builder.chain(["kXiDivM", "timeIntegrated", "AstarT"])?,
///     builder.chain(["kEtaDivM", "timeIntegrated", "BstarT"])?,
///     builder.chain(["kZetaDivM", "timeIntegrated", "CstarT"])?,
/// ])?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ExpressionBuilder<'a> {
    registry: &'a MatrixRegistry,
}

impl<'a> ExpressionBuilder<'a> {
    pub fn new(registry: &'a MatrixRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'a MatrixRegistry {
        self.registry
    }

    /// A leaf expression referring to a registered matrix.
    pub fn matrix(&self, name: &str) -> Result<Expression> {
        name.into_expression(self.registry)
    }

    /// The product `a * b`.
    ///
    /// Fails with [`KernelError::ShapeMismatch`] unless the column count of `a` equals
    /// the row count of `b`. Nested products are flattened into a single left-to-right chain.
    pub fn multiply(&self, a: impl Operand, b: impl Operand) -> Result<Expression> {
        let a = a.into_expression(self.registry)?;
        let b = b.into_expression(self.registry)?;
        let (a_shape, b_shape) = (a.validated_shape()?, b.validated_shape()?);
        if a_shape.1 != b_shape.0 {
            return Err(KernelError::ShapeMismatch {
                operation: "multiply",
                left: a.to_string(),
                left_shape: a_shape,
                right: b.to_string(),
                right_shape: b_shape,
            });
        }
        let mut factors = into_children(a, |node| matches!(node, ExpressionNode::Product(_)));
        factors.extend(into_children(b, |node| matches!(node, ExpressionNode::Product(_))));
        Ok(Expression::validated(ExpressionNode::Product(factors), (a_shape.0, b_shape.1)))
    }

    /// The sum `a + b`.
    ///
    /// Fails with [`KernelError::ShapeMismatch`] unless both operands have identical shapes.
    pub fn add(&self, a: impl Operand, b: impl Operand) -> Result<Expression> {
        let a = a.into_expression(self.registry)?;
        let b = b.into_expression(self.registry)?;
        let (a_shape, b_shape) = (a.validated_shape()?, b.validated_shape()?);
        if a_shape != b_shape {
            return Err(KernelError::ShapeMismatch {
                operation: "add",
                left: a.to_string(),
                left_shape: a_shape,
                right: b.to_string(),
                right_shape: b_shape,
            });
        }
        let mut summands = into_children(a, |node| matches!(node, ExpressionNode::Sum(_)));
        summands.extend(into_children(b, |node| matches!(node, ExpressionNode::Sum(_))));
        Ok(Expression::validated(ExpressionNode::Sum(summands), a_shape))
    }

    /// Multiplies the operands from left to right.
    pub fn chain<O: Operand>(&self, operands: impl IntoIterator<Item = O>) -> Result<Expression> {
        self.fold(operands, "chain", |a, b| self.multiply(a, b))
    }

    /// Adds the operands from left to right.
    pub fn sum<O: Operand>(&self, operands: impl IntoIterator<Item = O>) -> Result<Expression> {
        self.fold(operands, "sum", |a, b| self.add(a, b))
    }

    fn fold<O: Operand>(
        &self,
        operands: impl IntoIterator<Item = O>,
        operation: &str,
        combine: impl Fn(Expression, Expression) -> Result<Expression>,
    ) -> Result<Expression> {
        let mut operands = operands.into_iter();
        let first = operands
            .next()
            .ok_or_else(|| KernelError::PreconditionViolation(format!("{operation} of zero operands")))?
            .into_expression(self.registry)?;
        operands.try_fold(first, |acc, operand| {
            let operand = operand.into_expression(self.registry)?;
            combine(acc, operand)
        })
    }
}

/// Splits an expression into its children if it is a node of the flattened kind,
/// otherwise returns the expression itself.
fn into_children(expression: Expression, is_flattened_kind: impl Fn(&ExpressionNode) -> bool) -> Vec<Expression> {
    if is_flattened_kind(&expression.node) {
        match expression.node {
            ExpressionNode::Product(children) | ExpressionNode::Sum(children) => children,
            ExpressionNode::Matrix(_) => unreachable!(),
        }
    } else {
        vec![expression]
    }
}
